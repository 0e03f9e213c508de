//! Interactive console prompts
//!
//! Generic over the reader/writer so the question flow can be driven from
//! tests with canned answers.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::config::{parse_noise_list, NoisePreset, RunConfig, DEFAULT_NOISE};
use crate::inference::TileOptions;
use crate::workflow::Interaction;

pub struct Prompter<R, W> {
    input: R,
    output: W,
    tile_options: TileOptions,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            tile_options: TileOptions::default(),
        }
    }

    /// Tile size and overlap used when tiling is switched on
    pub fn with_tile_options(mut self, tile_options: TileOptions) -> Self {
        self.tile_options = tile_options;
        self
    }

    /// Print `question` and read one trimmed line; `None` once input is closed
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// `[y/N]` question; anything but `y` means no
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} [y/N]: ", question))?;
        Ok(answer.is_some_and(|a| a.eq_ignore_ascii_case("y")))
    }

    /// Menu: 1 = medium only, 2 = all released levels, 3 = custom list
    ///
    /// Unknown choices fall back to the medium level. Custom input is asked
    /// again until it parses.
    pub fn choose_noise_levels(&mut self) -> Result<Vec<u32>> {
        writeln!(self.output)?;
        writeln!(self.output, "⚙️  Choose noise levels:")?;
        writeln!(self.output, "1. Medium noise only (noise={})", DEFAULT_NOISE)?;
        writeln!(self.output, "2. All released noise levels (15, 25, 50)")?;
        writeln!(self.output, "3. Custom")?;

        let choice = self.ask("Choose (1-3): ")?.unwrap_or_default();
        match choice.as_str() {
            "1" => Ok(NoisePreset::Medium.levels()),
            "2" => Ok(NoisePreset::All.levels()),
            "3" => loop {
                let Some(custom) = self.ask("Noise levels, space separated (e.g. 15 25): ")? else {
                    bail!("Input closed while reading noise levels");
                };
                match parse_noise_list(&custom) {
                    Ok(levels) => break Ok(levels),
                    Err(e) => writeln!(self.output, "✗ {:#}", e)?,
                }
            },
            _ => Ok(vec![DEFAULT_NOISE]),
        }
    }

}

impl<R: BufRead, W: Write> Interaction for Prompter<R, W> {
    fn await_images(&mut self, _input_dir: &Path) -> Result<()> {
        writeln!(self.output)?;
        self.ask("Press Enter to continue (make sure the test images are in place)...")?;
        Ok(())
    }

    /// Noise levels and tiling come from the console; the rest of `config` is kept
    fn configure(&mut self, config: RunConfig) -> Result<RunConfig> {
        let noise_levels = self.choose_noise_levels()?;
        writeln!(self.output)?;
        let tile = self
            .confirm("Use tiling mode? (recommended for large images or low memory)")?
            .then_some(self.tile_options);

        Ok(RunConfig {
            noise_levels,
            tile,
            ..config
        })
    }

    fn confirm_ensemble_script(&mut self, _default: bool) -> Result<bool> {
        writeln!(self.output)?;
        self.confirm("Create the ensemble script?")
    }
}
