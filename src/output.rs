use std::io::{self, Write};

use serde::Serialize;

use crate::batch::BatchSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &BatchSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_summary(summary: &BatchSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &BatchSummary) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        writeln!(out, "{cyan}genefetch summary ({}){reset}", summary.gene)?;
        for item in &summary.items {
            match item.status.as_str() {
                "written" => writeln!(
                    out,
                    "{green}  written   {} -> {}{reset}",
                    item.species,
                    item.path.as_deref().unwrap_or("-")
                )?,
                "failed" => writeln!(
                    out,
                    "{red}  failed    {}: {}{reset}",
                    item.species,
                    item.error.as_deref().unwrap_or("unknown error")
                )?,
                status => writeln!(out, "{yellow}  skipped   {} ({status}){reset}", item.species)?,
            }
        }
        writeln!(
            out,
            "{cyan}Processing completed: {} written, {} without records, {} empty, {} failed{reset}",
            summary.written, summary.no_results, summary.empty_payload, summary.failed
        )
    }
}
