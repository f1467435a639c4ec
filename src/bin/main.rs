use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jembed::common::{ClassPathChain, ClasspathResolver, TypeCache};
use jembed::{Compiler, Config, UnreachablePolicy};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "jembed")]
#[command(about = "Compile a Java subset to JVM class files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile .java files (or directories of them) to .class files
    Compile {
        /// Source files or directories
        #[arg(value_name = "PATH", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory for .class files
        #[arg(short = 'd', long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Class path for external types (falls back to CLASSPATH)
        #[arg(long = "cp", alias = "classpath", value_name = "PATH")]
        classpath: Option<String>,

        /// Emit all debug information
        #[arg(short = 'g')]
        debug: bool,

        /// Report every member-level error instead of stopping at the first
        #[arg(long)]
        batch: bool,

        /// Drop unreachable statements with a warning instead of rejecting them
        #[arg(long)]
        elide_unreachable: bool,

        /// Class-file major version
        #[arg(long, value_name = "MAJOR")]
        target: Option<u16>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse a .java file and show the AST
    Parse {
        /// Input .java file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Lexically analyze a .java file
    Lex {
        /// Input .java file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Show token locations
        #[arg(short, long)]
        locations: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            inputs,
            output,
            classpath,
            debug,
            batch,
            elide_unreachable,
            target,
            verbose,
        } => {
            let mut config = Config::default();
            if debug {
                config = config.with_full_debug();
            }
            if batch {
                let max_errors = config.max_errors;
                config = config.with_batch_mode(max_errors);
            }
            if elide_unreachable {
                config = config.with_unreachable(UnreachablePolicy::Elide);
            }
            if let Some(major) = target {
                config = config.with_target_version(major);
            }
            let classpath = ClasspathResolver::resolve_classpath(classpath.as_deref());
            compile_files(&inputs, &output, &classpath, config, verbose)?;
        }
        Commands::Parse { input } => {
            parse_file(&input)?;
        }
        Commands::Lex { input, locations } => {
            lex_file(&input, locations)?;
        }
    }

    Ok(())
}

/// Expand directories into the `.java` files below them
fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type().is_file() && path.extension().map_or(false, |ext| ext == "java") {
                    sources.push(path.to_path_buf());
                }
            }
        } else if input.is_file() {
            sources.push(input.clone());
        } else {
            bail!("no such file or directory: {}", input.display());
        }
    }
    Ok(sources)
}

fn compile_files(inputs: &[PathBuf], output: &Path, classpath: &str, config: Config, verbose: bool) -> Result<()> {
    let sources = collect_sources(inputs)?;
    if sources.is_empty() {
        bail!("no .java sources found");
    }
    if verbose {
        println!("Compiling {} file(s) with classpath {}", sources.len(), classpath);
    }

    let compiler = Compiler::with_class_path(config, TypeCache::new(), ClassPathChain::from_classpath(classpath));
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    match jembed::compile_files(&compiler, &sources, output) {
        Ok(classes) => {
            if verbose {
                for name in classes.keys() {
                    println!("  wrote {}", name);
                }
                println!("Compilation successful! Output directory: {}", output.display());
            }
            Ok(())
        }
        Err(error) => {
            for diagnostic in error.diagnostics() {
                eprintln!("{}", diagnostic);
            }
            bail!("compilation failed")
        }
    }
}

fn parse_file(input: &Path) -> Result<()> {
    let source = fs::read_to_string(input)?;
    let unit = jembed::parser::parse_compilation_unit(&source)?;
    println!("{:#?}", unit);
    Ok(())
}

fn lex_file(input: &Path, locations: bool) -> Result<()> {
    let source = fs::read_to_string(input)?;
    let lexer = jembed::parser::Lexer::new(&source);
    let tokens = lexer.tokenize()?;

    for token in tokens {
        if locations {
            println!("{:?} at {}:{}", token.token, token.location.line, token.location.column);
        } else {
            println!("{:?}: '{}'", token.token, token.lexeme);
        }
    }

    Ok(())
}
