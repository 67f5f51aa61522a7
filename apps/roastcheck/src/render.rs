use std::io::{self, Write};

use clap::ValueEnum;
use client_core::{SessionPhase, SessionView};
use serde_json::json;
use shared::domain::RoastProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub trait SessionRenderer {
    fn render(&mut self, view: &SessionView) -> io::Result<()>;
    fn notice(&mut self, message: &str) -> io::Result<()>;
    fn profiles(&mut self, profiles: &[RoastProfile]) -> io::Result<()>;
}

pub fn renderer<'a, W>(format: OutputFormat, out: W) -> Box<dyn SessionRenderer + 'a>
where
    W: Write + 'a,
{
    match format {
        OutputFormat::Text => Box::new(TextRenderer { out }),
        OutputFormat::Json => Box::new(JsonRenderer { out }),
    }
}

pub struct TextRenderer<W> {
    out: W,
}

impl<W: Write> SessionRenderer for TextRenderer<W> {
    fn render(&mut self, view: &SessionView) -> io::Result<()> {
        let file_name = view.file_name.as_deref().unwrap_or("image");
        match view.phase {
            SessionPhase::Idle => writeln!(self.out, "No image selected.")?,
            SessionPhase::Staged => {
                writeln!(self.out, "Staged {file_name}. Submit to analyze the roast.")?;
                if let Some(preview) = &view.preview {
                    writeln!(self.out, "  preview: {preview}")?;
                }
            }
            SessionPhase::Submitting => writeln!(self.out, "Analyzing {file_name}...")?,
            SessionPhase::Resolved => match view.profile {
                Some(profile) => {
                    writeln!(
                        self.out,
                        "{file_name}: {} ({})",
                        profile.name, profile.accent_color
                    )?;
                    writeln!(self.out, "  {}", profile.description)?;
                }
                None => writeln!(self.out, "{file_name}: classified")?,
            },
            SessionPhase::Failed => {
                let kind = view
                    .error_kind
                    .map(|kind| kind.as_str())
                    .unwrap_or("unknown");
                let message = view.error_message.as_deref().unwrap_or("analysis failed");
                writeln!(self.out, "Analysis of {file_name} failed [{kind}]: {message}")?;
            }
        }
        self.out.flush()
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }

    fn profiles(&mut self, profiles: &[RoastProfile]) -> io::Result<()> {
        for profile in profiles {
            writeln!(
                self.out,
                "{}  {:<13} {}  {}",
                profile.code, profile.name, profile.accent_color, profile.description
            )?;
        }
        self.out.flush()
    }
}

/// One JSON document per line, for scripts and other front ends.
pub struct JsonRenderer<W> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    fn emit(&mut self, value: &impl serde::Serialize) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> SessionRenderer for JsonRenderer<W> {
    fn render(&mut self, view: &SessionView) -> io::Result<()> {
        self.emit(view)
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        self.emit(&json!({ "notice": message }))
    }

    fn profiles(&mut self, profiles: &[RoastProfile]) -> io::Result<()> {
        self.emit(&profiles)
    }
}
