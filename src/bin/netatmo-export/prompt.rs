use std::io::{self, BufRead as _, Write as _};

use netatmo_export::fleet::RetryDecision;

use crate::args::RetryMode;

const RETRY_QUESTION: &str = "Do you want to retrieve the information without specifying \
    a begin timestamp for the above devices? [y/N] ";

/// Lists the failed devices and settles whether to refetch them with full history.
pub fn decide_retry(failed: &[String], mode: RetryMode) -> RetryDecision {
    println!("Failed retrieving the measurements for the following devices:");
    for name in failed {
        println!("- {name}");
    }

    match mode {
        RetryMode::Always => RetryDecision::Retry,
        RetryMode::Never => RetryDecision::Skip,
        RetryMode::Ask => match ask(RETRY_QUESTION) {
            Ok(answer) => parse_answer(&answer),
            Err(e) => {
                eprintln!("failed to read answer: {e}");
                RetryDecision::Skip
            }
        },
    }
}

fn ask(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout)?;
    write!(stdout, "{question}")?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer)
}

fn parse_answer(answer: &str) -> RetryDecision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => RetryDecision::Retry,
        _ => RetryDecision::Skip,
    }
}
