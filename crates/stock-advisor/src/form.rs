//! Terminal form: API key, tickers, keywords and a run confirmation.

use std::io::{self, BufRead, Write};

use crate::config::{parse_list, parse_tickers, AdvisorConfig};

/// Read as a plain line, so the terminal echoes it.
const KEY_PROMPT: &str = "NewsAPI key (input is visible; NEWS_API_KEY avoids typing it)";

/// Ask for one line. Blank input or end of input keeps `default`.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: Option<&str>,
) -> io::Result<Option<String>> {
    match default {
        Some(d) if !d.is_empty() => write!(output, "{} [{}]: ", label, d)?,
        _ => write!(output, "{}: ", label)?,
    }
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    let answer = line.trim();

    if read == 0 || answer.is_empty() {
        Ok(default.map(|d| d.to_string()))
    } else {
        Ok(Some(answer.to_string()))
    }
}

/// Yes/no question defaulting to yes.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    let answer = prompt_line(input, output, &format!("{} (Y/n)", question), None)?;
    Ok(match answer {
        None => true,
        Some(a) => matches!(a.to_ascii_lowercase().as_str(), "y" | "yes"),
    })
}

/// Fill the form interactively. Returns `false` if the user declined to run.
pub fn fill<R: BufRead, W: Write>(config: &mut AdvisorConfig, input: &mut R, output: &mut W) -> io::Result<bool> {
    if config.news_api_key.is_none() {
        config.news_api_key =
            prompt_line(input, output, KEY_PROMPT, None)?.filter(|k| !k.trim().is_empty());
    }

    let tickers = config.tickers.join(",");
    if let Some(answer) = prompt_line(input, output, "Tickers", Some(&tickers))? {
        config.tickers = parse_tickers(&answer);
    }

    let keywords = config.keywords.join(",");
    if let Some(answer) = prompt_line(input, output, "Sentiment keywords", Some(&keywords))? {
        config.keywords = parse_list(&answer);
    }

    if config.assume_yes {
        return Ok(true);
    }
    confirm(input, output, "Run analysis")
}
