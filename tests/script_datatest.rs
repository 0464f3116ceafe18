use datatest_stable::Utf8Path;
use um::{reader::Reader, Config, Interpreter};

#[derive(thiserror::Error, Debug)]
#[error("script output mismatch in datatest at {0}")]
pub struct DatatestError(Box<Utf8Path>);

/// A script test file: one expected line per top-level form, `---`, then the source.
///
/// Lines starting with `;` above the separator are comments and are kept in place
/// when the file is rewritten.
struct ScriptFile<'a> {
    expected: Vec<&'a str>,
    comments: Vec<(usize, &'a str)>,
    source: String,
}

fn read_datatest(contents: &str) -> ScriptFile {
    let mut expected = vec![];
    let mut comments = vec![];
    let mut source = String::new();
    let mut in_source = false;

    for (idx, line) in contents.lines().enumerate() {
        if in_source {
            if !source.is_empty() {
                source.push('\n');
            }
            source.push_str(line);
        } else if line.trim_end() == "---" {
            in_source = true;
        } else if line.trim_start().starts_with(';') {
            comments.push((idx, line));
        } else {
            expected.push(line);
        }
    }

    ScriptFile {
        expected,
        comments,
        source,
    }
}

// from https://matklad.github.io/2021/05/31/how-to-test.html
// DATATEST_EXPECT rewrites the expected section from what the script produced
fn stitch_to_datatest(got: &[String], source: &str, mut comments: Vec<(usize, &str)>) -> String {
    comments.reverse();
    let mut lines: Vec<&str> = Vec::with_capacity(got.len() + comments.len() + 1);
    for line in got {
        while comments.last().is_some_and(|(at, _)| *at <= lines.len()) {
            let Some((_, comment)) = comments.pop() else {
                unreachable!()
            };
            lines.push(comment);
        }
        lines.push(line);
    }
    lines.extend(comments.into_iter().rev().map(|(_, comment)| comment));
    lines.push("---");
    lines.extend(source.lines());
    lines.join("\n") + "\n"
}

/// Runs every top-level form, reporting each result in write form or its error.
///
/// An evaluation error only ends its own form; a read error ends the script.
fn run_script(source: &str) -> Vec<String> {
    let mut um = Interpreter::new(Config::default());
    let mut reader = Reader::new(source);
    let mut got = vec![];
    loop {
        match um.read_next(&mut reader) {
            Ok(Some(form)) => got.push(match um.eval_top(form) {
                Ok(value) => um.write(value),
                Err(err) => format!("error: {err}"),
            }),
            Ok(None) => break,
            Err(err) => {
                got.push(format!("error: {err}"));
                break;
            }
        }
    }
    got
}

fn script_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let ScriptFile {
        expected,
        comments,
        source,
    } = read_datatest(&contents);
    let got = run_script(&source);

    if std::env::var("DATATEST_EXPECT").is_ok() {
        std::fs::write(path, stitch_to_datatest(&got, &source, comments))?;
        return Ok(());
    }

    let mismatches: Vec<_> = got
        .iter()
        .enumerate()
        .filter(|(idx, line)| expected.get(*idx).map(|e| e.trim()) != Some(line.as_str()))
        .collect();
    if mismatches.is_empty() && expected.len() == got.len() {
        return Ok(());
    }

    println!("Script test {path} failed:\n  form: got -> expected");
    for (idx, line) in mismatches {
        println!(
            "  {idx}: {line} -> {}",
            expected.get(idx).copied().unwrap_or("<not present>")
        );
    }
    if expected.len() > got.len() {
        println!("  {} expected results were never produced", expected.len() - got.len());
    }
    Err(DatatestError(Box::from(path)))?
}

datatest_stable::harness! {
    script_test, "test_data", r"^.*\.um",
}
