use colored::*;
use taf_syntax::{PositionedError, Stage};

fn help_for(err: &PositionedError) -> &'static str {
    match err.stage {
        Stage::Load => "The file is not a well-formed YAML document",
        Stage::Lex => "Check indentation and the shape of the value at this key",
        Stage::Parse => "Sections must appear once each, in the order the grammar defines",
    }
}

/// Prints a compile error, with the source excerpt when the script text is available.
pub fn display(err: &PositionedError, source: Option<&str>) {
    eprintln!(
        "{} {}",
        format!("{} error:", err.stage).red().bold(),
        err.message.bold()
    );

    match source {
        Some(source) => eprintln!("{}", err.render(source)),
        None => {
            let location = match &err.path {
                Some(path) => format!("{} line {} column {}", path.display(), err.line(), err.column()),
                None => format!("line {} column {}", err.line(), err.column()),
            };
            eprintln!("  {} {}", "-->".blue().bold(), location);
        }
    }

    eprintln!();
    eprintln!("{} {}", "help:".cyan().bold(), help_for(err));
}
