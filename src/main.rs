use lispette::{Interpreter, InterpreterConfig, run_with};
use tracing_subscriber::EnvFilter;

// Factorial via a self-referential closure; each `if` branch is a thunk so only
// the selected one runs.
const PROGRAM: &str = "
(def :fact #(if (eq %0 0) #(id 1) #(mul %0 (fact (sub %0 1)))))
(print (list :fact :of 5 :is (fact 5)))
(fact 10)
";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut interpreter = Interpreter::with_config(InterpreterConfig::from_env());
    match run_with(&mut interpreter, PROGRAM) {
        Ok(values) => {
            for value in values {
                println!("=> {}", value);
            }
        }
        Err(e) => {
            if e.pretty_print("program", PROGRAM).is_err() {
                eprintln!("Error: {}", e);
            }
            std::process::exit(1);
        }
    }
}
