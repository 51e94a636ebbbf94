use std::{fmt::Display, io::Write};

use anyhow::Context;
use clap::Args;
use serde::Serialize;

#[derive(Debug, Args)]
pub struct PrinterArgs {
    /// The output format to use. Valid options are "plain", "json", and "binary". Default is "plain".
    #[arg(long, short = 'o', global = true, default_value_t = Format::default())]
    pub output: Format,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Plain,
    Json,
    Binary,
}

impl std::str::FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" => Ok(Format::Plain),
            "json" => Ok(Format::Json),
            "binary" => Ok(Format::Binary),
            _ => Err(anyhow::anyhow!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Format::Plain => "plain",
            Format::Json => "json",
            Format::Binary => "binary",
        };
        write!(f, "{}", s)
    }
}

impl Format {
    /// Print a report: its `Display` form for plain output, otherwise its serialized form.
    pub fn print<R, W>(&self, report: &R, writer: &mut W) -> anyhow::Result<()>
    where
        R: Serialize + Display,
        W: Write,
    {
        match self {
            Format::Plain => writeln!(writer, "{report}").context("writing plain output"),
            Format::Json => {
                serde_json::to_writer(&mut *writer, report).context("JSON serialization failed")?;
                writeln!(writer).context("writing JSON output")
            }
            Format::Binary => {
                ciborium::into_writer(report, writer).context("CBOR serialization failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[derive(Debug, Clone, Serialize, serde::Deserialize)]
    struct Row {
        name: String,
    }

    impl Display for Row {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "row {}", self.name)
        }
    }

    #[test]
    fn format_from_str_accepts_supported_values() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("PLAIN".parse::<Format>().unwrap(), Format::Plain);
        assert!("yaml".parse::<Format>().is_err());
    }

    #[test]
    fn plain_uses_display() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        Format::Plain.print(&Row { name: "x".into() }, &mut buffer)?;
        assert_eq!(String::from_utf8(buffer)?, "row x\n");
        Ok(())
    }

    #[test]
    fn json_is_one_line_per_report() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        Format::Json.print(&Row { name: "gamma".into() }, &mut buffer)?;
        let text = String::from_utf8(buffer)?;
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(text.trim())?;
        assert_eq!(value["name"], "gamma");
        Ok(())
    }

    #[test]
    fn binary_format_round_trip() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        Format::Binary.print(&Row { name: "delta".into() }, &mut buffer)?;

        let mut cursor = Cursor::new(buffer);
        let decoded: Row = ciborium::from_reader(&mut cursor)?;

        assert_eq!(decoded.name, "delta");

        Ok(())
    }
}
