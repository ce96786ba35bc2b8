//! CLI: generate | check | scaffold over two Ada schemas and a mapping file.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::provider::ProviderKind;
use crate::resolve::NarrowingPolicy;
use crate::run::{self, RunConfig, RunOutcome};
use crate::{scaffold, toolcheck};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate Ada `Map` conversion functions between two type schemas
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve the mapping file and write the mapper package
    Generate(GenerateCmd),
    /// resolve the mapping file and report problems without writing anything
    Check(CheckCmd),
    /// write a mapping.json skeleton for the given destination types
    Scaffold(ScaffoldCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// directory holding the schema files and receiving generated output
    src_dir: PathBuf,

    /// source-side schema file (default <src_dir>/types_from.ads)
    #[arg(long)]
    from_spec: Option<PathBuf>,

    /// destination-side schema file (default <src_dir>/types_to.ads)
    #[arg(long)]
    to_spec: Option<PathBuf>,

    /// schema parsing strategy
    #[arg(long, value_enum, default_value_t = ProviderArg::Lexical)]
    provider: ProviderArg,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ProviderArg {
    /// pattern scanner; tolerates irregular input
    Lexical,
    /// strict recursive-descent parser with line-numbered errors
    Syntax,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum NarrowingArg {
    /// emit lossy casts and warn
    Warn,
    /// fail the pair on any lossy cast
    Reject,
}

#[derive(Args, Debug)]
struct GenerateCmd {
    /// mapping specification (mappings.json)
    mappings: PathBuf,

    #[command(flatten)]
    schema: SchemaSettings,

    /// Ada package name for the generated unit
    #[arg(long, default_value = "Position_Mappers")]
    unit: String,

    /// what to do with narrowing numeric coercions
    #[arg(long, value_enum, default_value_t = NarrowingArg::Warn)]
    narrowing: NarrowingArg,

    /// resolve mapping pairs on worker threads
    #[arg(long)]
    parallel: bool,

    /// after writing, semantic-check the output with this Ada compiler
    #[arg(long, value_name = "TOOL")]
    check_with: Option<String>,
}

#[derive(Args, Debug)]
struct CheckCmd {
    /// mapping specification (mappings.json)
    mappings: PathBuf,

    #[command(flatten)]
    schema: SchemaSettings,

    /// what to do with narrowing numeric coercions
    #[arg(long, value_enum, default_value_t = NarrowingArg::Warn)]
    narrowing: NarrowingArg,
}

#[derive(Args, Debug)]
struct ScaffoldCmd {
    #[command(flatten)]
    schema: SchemaSettings,

    /// destination types to scaffold mappings for
    #[arg(long, short, num_args = 1.., required_unless_present = "update")]
    types: Vec<String>,

    /// output mapping file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// overwrite an existing output file
    #[arg(long)]
    force: bool,

    /// merge fresh suggestions into an existing mapping file, keeping
    /// hand-written values
    #[arg(long, requires = "out", conflicts_with = "force")]
    update: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn from_path(&self) -> PathBuf {
        self.from_spec
            .clone()
            .unwrap_or_else(|| self.src_dir.join("types_from.ads"))
    }

    fn to_path(&self) -> PathBuf {
        self.to_spec
            .clone()
            .unwrap_or_else(|| self.src_dir.join("types_to.ads"))
    }

    fn provider(&self) -> ProviderKind {
        match self.provider {
            ProviderArg::Lexical => ProviderKind::Lexical,
            ProviderArg::Syntax => ProviderKind::Syntax,
        }
    }

    fn read_sources(&self) -> anyhow::Result<(String, String)> {
        let from = read(&self.from_path())?;
        let to = read(&self.to_path())?;
        Ok((from, to))
    }
}

impl NarrowingArg {
    fn policy(self) -> NarrowingPolicy {
        match self {
            NarrowingArg::Warn => NarrowingPolicy::Warn,
            NarrowingArg::Reject => NarrowingPolicy::Reject,
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(cmd) => cmd.run(),
            Command::Check(cmd) => cmd.run(),
            Command::Scaffold(cmd) => cmd.run(),
        }
    }
}

impl GenerateCmd {
    fn run(&self) -> anyhow::Result<()> {
        let (from_src, to_src) = self.schema.read_sources()?;
        let mapping_json = read(&self.mappings)?;
        let cfg = RunConfig {
            provider: self.schema.provider(),
            policy: self.narrowing.policy(),
            parallel: self.parallel,
            unit_name: self.unit.clone(),
        };
        let outcome = run::generate(&cfg, &from_src, &to_src, &mapping_json)?;
        report(&outcome);

        let unit = match &outcome.unit {
            Some(unit) => unit,
            None => bail!("no mapping pair survived resolution; nothing written"),
        };
        let stem = unit.file_stem();
        let spec_path = self.schema.src_dir.join(format!("{stem}.ads"));
        let body_path = self.schema.src_dir.join(format!("{stem}.adb"));
        std::fs::create_dir_all(&self.schema.src_dir)
            .with_context(|| format!("creating {}", self.schema.src_dir.display()))?;
        std::fs::write(&spec_path, &unit.spec)
            .with_context(|| format!("writing {}", spec_path.display()))?;
        std::fs::write(&body_path, &unit.body)
            .with_context(|| format!("writing {}", body_path.display()))?;
        eprintln!("wrote {} and {}", spec_path.display(), body_path.display());

        if let Some(tool) = &self.check_with {
            let files = vec![
                self.schema.from_path().display().to_string(),
                self.schema.to_path().display().to_string(),
                body_path.display().to_string(),
            ];
            let report = toolcheck::compile_check(tool, Path::new("."), &files)?;
            if !report.success {
                eprintln!("{}", report.output);
                bail!("generated unit failed the {tool} semantic check");
            }
            eprintln!("{}", format!("{tool} semantic check passed").green());
        }

        if !outcome.failures.is_empty() {
            bail!(
                "{} of {} mapping pairs failed",
                outcome.failures.len(),
                outcome.failures.len() + outcome.emitted_pairs.len()
            );
        }
        Ok(())
    }
}

impl CheckCmd {
    fn run(&self) -> anyhow::Result<()> {
        let (from_src, to_src) = self.schema.read_sources()?;
        let mapping_json = read(&self.mappings)?;
        let cfg = RunConfig {
            provider: self.schema.provider(),
            policy: self.narrowing.policy(),
            parallel: false,
            unit_name: "Position_Mappers".to_string(),
        };
        let outcome = run::generate(&cfg, &from_src, &to_src, &mapping_json)?;
        report(&outcome);
        if !outcome.failures.is_empty() {
            bail!("{} mapping pair(s) failed", outcome.failures.len());
        }
        eprintln!(
            "{}",
            format!("{} mapping pair(s) resolve cleanly", outcome.emitted_pairs.len()).green()
        );
        Ok(())
    }
}

impl ScaffoldCmd {
    fn run(&self) -> anyhow::Result<()> {
        let (from_src, to_src) = self.schema.read_sources()?;
        let provider = self.schema.provider();
        let from = crate::provider::parse_schema(provider, crate::schema::Side::From, &from_src)?;
        let to = crate::provider::parse_schema(provider, crate::schema::Side::To, &to_src)?;

        if self.update {
            let out = self.out.as_ref().ok_or_else(|| anyhow!("--update requires --out"))?;
            if out.exists() {
                let existing = read(out)?;
                let (doc, changed) = scaffold::update(&from, &to, &existing, &self.types)?;
                if changed {
                    std::fs::write(out, doc.to_json())
                        .with_context(|| format!("writing {}", out.display()))?;
                    eprintln!("updated {}", out.display());
                } else {
                    eprintln!("{} is already up to date", out.display());
                }
                return Ok(());
            }
            // nothing to merge; fall through and write a fresh scaffold
        }

        let doc = scaffold::build(&from, &to, &self.types)?;
        let json = doc.to_json();
        match &self.out {
            Some(out) => {
                if out.exists() && !self.force {
                    return Err(anyhow!(
                        "{} already exists; pass --force to overwrite",
                        out.display()
                    ));
                }
                std::fs::write(out, &json).with_context(|| format!("writing {}", out.display()))?;
                eprintln!("wrote {}", out.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn report(outcome: &RunOutcome) {
    for diag in &outcome.diagnostics {
        eprintln!("{} {diag}", "warning:".yellow().bold());
    }
    for (name, err) in &outcome.failures {
        eprintln!("{} mapping '{name}': {err}", "error:".red().bold());
    }
}
