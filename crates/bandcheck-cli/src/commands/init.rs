//! The `bandcheck init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("bandcheck.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("answer-keys")?;
    write_if_missing(Path::new("answer-keys/example.toml"), EXAMPLE_KEY)?;
    write_if_missing(Path::new("example-answers.json"), EXAMPLE_ANSWERS)?;

    println!("\nNext steps:");
    println!("  1. Add your own answer keys under answer-keys/");
    println!("  2. Run: bandcheck validate --key answer-keys");
    println!("  3. Run: bandcheck score --key example --answers example-answers.json");
    println!("  4. For speaking practice, fill in [transcriber] and [evaluator] in bandcheck.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# bandcheck configuration

default_module = "academic-reading"
answer_keys_dir = "./answer-keys"
output_dir = "./bandcheck-results"

# Spelling tolerance for fill-in-the-blank answers
[matching]
word_order = true
ignore_articles = true
allow_plurals = true
short_len = 5
long_len = 8
max_edits = 1

[store]
type = "file"
path = "./bandcheck-results/scores.jsonl"

# Speaking practice needs both of these.
# [transcriber]
# type = "openai"
# api_key = "${OPENAI_API_KEY}"
#
# [evaluator]
# type = "openai"
# api_key = "${OPENAI_API_KEY}"
# model = "gpt-4.1-mini"
"#;

const EXAMPLE_KEY: &str = r#"[test]
id = "example"
name = "Example Reading Section"
description = "A short key to get started"
module = "academic-reading"

[[ranges]]
first = 1
last = 3
kind = "tfng"

[[ranges]]
first = 4
last = 5
kind = "choice"

[answers]
1 = "TRUE"
2 = "NOT GIVEN"
3 = "FALSE"
4 = "B"
5 = "D"
6 = "irrigation"
7 = "mosquito/mosquitos/mosquitoes"
8a = "books"
8b = "activities"
"#;

const EXAMPLE_ANSWERS: &str = r#"{
  "1": "true",
  "2": "not given",
  "3": "TRUE",
  "4": "b",
  "5": "D",
  "6": "irigation",
  "7": "mosquitoes",
  "8a": "books",
  "8b": ""
}
"#;
