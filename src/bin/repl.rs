use std::cell::RefCell;
use std::rc::Rc;

use lispette::{Interpreter, InterpreterConfig, Scope, TokenKind, parse_str, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing_subscriber::EnvFilter;

const HISTORY_FILE: &str = "lispette_history.txt";

struct LispetteCompleter {
    scope: Rc<RefCell<Scope>>,
}

impl LispetteCompleter {
    fn new(scope: Rc<RefCell<Scope>>) -> Self {
        LispetteCompleter { scope }
    }
}

impl rustyline::completion::Completer for LispetteCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last() {
                // Only complete a name the cursor is still touching
                Some(token) if token.kind == TokenKind::Identifier && token.span.end == pos => {
                    token.text.to_string()
                }
                _ => return Ok((pos, vec![])),
            },
            Err(_) => return Ok((pos, vec![])),
        };
        // `:name` completes against bound names too, since that is how `def` spells them
        let bare = prefix.trim_start_matches(':');
        let mut candidates: Vec<String> = self
            .scope
            .borrow()
            .get_identifiers()
            .into_iter()
            .filter(|id| id.starts_with(bare) && id.len() > bare.len())
            .map(|id| id[bare.len()..].to_string())
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: BracketValidator,
    #[rustyline(Highlighter)]
    highlighter: BracketHighlighter,
    #[rustyline(Completer)]
    completer: LispetteCompleter,
}

struct BracketValidator;

impl Validator for BracketValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth = 0usize;
        for (i, c) in ctx.input().chars().enumerate() {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - Unmatched ')' at position {}",
                        i
                    ))));
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct BracketHighlighter;

impl Highlighter for BracketHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> std::borrow::Cow<'l, str> {
        // (offset in `highlighted`, char index in `line`) of each open bracket
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut highlighted = String::new();

        for (i, c) in line.chars().enumerate() {
            match c {
                '(' => {
                    stack.push((highlighted.len(), i));
                    highlighted.push(c);
                }
                ')' => match stack.pop() {
                    Some((matching_pos, open_index))
                        if open_index + 1 == pos || i + 1 == pos =>
                    {
                        // Blue for matching brackets
                        highlighted.push_str("\x1b[34m)\x1b[0m");
                        highlighted
                            .replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                    }
                    Some(_) => highlighted.push(c),
                    // Red for unmatched closing brackets
                    None => highlighted.push_str("\x1b[31m)\x1b[0m"),
                },
                '#' => highlighted.push_str("\x1b[35m#\x1b[0m"), // Magenta for the lambda opener
                _ => highlighted.push(c),
            }
        }

        std::borrow::Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    println!("Lispette REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let mut interpreter = Interpreter::with_config(InterpreterConfig::from_env());
    // One session scope for the whole REPL so `def`s persist between lines
    let session = interpreter.session_scope();
    let helper = InputHelper {
        highlighter: BracketHighlighter,
        validator: BracketValidator,
        completer: LispetteCompleter::new(session.clone()),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("lispette> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }

                let forest = match parse_str(input) {
                    Ok(forest) => forest,
                    Err(parse_err) => {
                        if parse_err.pretty_print("repl", input).is_err() {
                            eprintln!("Parse Error: {}", parse_err);
                        }
                        continue;
                    }
                };
                for node in &forest {
                    match interpreter.evaluate(node, &session) {
                        Ok(value) => println!("{}", value),
                        Err(e) => {
                            if e.pretty_print("repl", input).is_err() {
                                eprintln!("Error: {}", e);
                            }
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
