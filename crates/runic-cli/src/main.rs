use std::{env::args, path::Path, str::FromStr};

use anyhow::Context;
use runic::{Grammar, ParseOptions, SourceFile};

fn main() {
    init_logger();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_logger() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_owned());
    let level = log::LevelFilter::from_str(&level).unwrap_or(log::LevelFilter::Warn);

    simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    )
    .unwrap();
}

fn run() -> anyhow::Result<()> {
    let mut simplify = true;
    let mut files = Vec::new();

    for arg in args().skip(1) {
        match arg.as_str() {
            "--no-simplify" => simplify = false,
            _ if arg.starts_with('-') => {
                anyhow::bail!("unknown flag `{arg}`");
            }
            _ => files.push(arg),
        }
    }

    let [grammar_path, input_path] = files.as_slice() else {
        eprintln!("Usage: runic [--no-simplify] <grammar.syn> <input>");
        anyhow::bail!("expected a grammar file and an input file");
    };

    let grammar_file = SourceFile::read(Path::new(grammar_path))
        .with_context(|| format!("failed to read `{grammar_path}`"))?;
    let grammar = Grammar::compile(&grammar_file)?;

    let input = SourceFile::read(Path::new(input_path))
        .with_context(|| format!("failed to read `{input_path}`"))?;

    let options = ParseOptions {
        allow_ident_underscores: false,
        simplify,
    };
    let tree = grammar.parse(input, &options)?;

    println!("{}", tree.render(&grammar));
    Ok(())
}
