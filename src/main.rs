// src/main.rs

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use debrip::config::{self, Config, DEFAULT_DIST, DEFAULT_REPO};
use debrip::db;
use debrip::installer::{self, Target};
use debrip::packages::DebExtractor;
use debrip::remover::Remover;
use debrip::repository::{PackageIndex, RepositoryClient};
use debrip::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "debrip")]
#[command(author, version, about = "Rip packages from the Ubuntu repos into an unprivileged root", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/debrip/debrip.json)
    #[arg(long, global = true, env = "DEBRIP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages and their dependencies
    Install {
        /// Packages to install (exact name or unique substring)
        #[arg(required = true)]
        packages: Vec<String>,
        /// Distribution to download from
        #[arg(long, default_value = DEFAULT_DIST)]
        dist: String,
        /// Repository to download from
        #[arg(long, default_value = DEFAULT_REPO)]
        repo: String,
        /// Mark packages as installed by the system instead of downloading them
        #[arg(long)]
        system: bool,
    },
    /// Remove packages and dependencies nothing else needs
    Remove {
        /// Packages to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Search the package index
    Search {
        /// Substring to look for in package names
        query: String,
        #[arg(long, default_value = DEFAULT_DIST)]
        dist: String,
        #[arg(long, default_value = DEFAULT_REPO)]
        repo: String,
    },
    /// List installed packages
    List,
    /// Re-download the package index
    Update {
        #[arg(long, default_value = DEFAULT_DIST)]
        dist: String,
        #[arg(long, default_value = DEFAULT_REPO)]
        repo: String,
    },
    /// Show dependencies of an installed package
    Depends {
        /// Package name
        package_name: String,
    },
    /// Show reverse dependencies (what depends on this package)
    Rdepends {
        /// Package name
        package_name: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    Ok(Config::load_or_init(&path)?)
}

fn installed_marker(dist: &str, repo: &str, explicit: bool) -> String {
    format!("{}/{}{}", dist, repo, if explicit { ", explicit" } else { "" })
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Install {
            packages,
            dist,
            repo,
            system,
        }) => {
            let config = load_config(cli.config)?;
            let mut state = db::load(&config.install_root)?;

            if system {
                let already = installer::mark_system(&packages, &mut state);
                for name in &already {
                    println!("Package \"{}\" is already installed", name);
                }
                db::save(&config.install_root, &state)?;
                return Ok(());
            }

            let client = RepositoryClient::new()?;
            let index = PackageIndex::load(&client, &config, &dist, &repo)?;
            let target = Target::new(dist, repo);

            info!("Installing packages: {}", packages.join(", "));
            let report = installer::install_packages(
                &config,
                &index,
                &client,
                &DebExtractor::new(),
                &target,
                &packages,
                &mut state,
                std::io::stderr().is_terminal(),
            )?;

            for name in &report.already_installed {
                println!("Package \"{}\" is already installed", name);
            }
            if !report.installed.is_empty() {
                db::save(&config.install_root, &state)?;
                println!(
                    "Installed {} package(s): {}",
                    report.installed.len(),
                    report.installed.join(", ")
                );
            }

            Ok(())
        }
        Some(Commands::Remove { packages }) => {
            let config = load_config(cli.config)?;
            let mut state = db::load(&config.install_root)?;

            if let Some(missing) = packages.iter().find(|name| !state.contains(name)) {
                return Err(Error::NotInstalled(missing.clone()).into());
            }

            let mut blocked = Vec::new();
            for name in &packages {
                let result = Remover::new(&config.install_root, &mut state).remove(name);
                match result {
                    Ok(report) => {
                        for removed in &report.removed {
                            println!("Removed package: {}", removed);
                        }
                        if !report.missing_files.is_empty() {
                            println!("  Missing files: {}", report.missing_files.len());
                        }
                    }
                    Err(e @ Error::BlockedByDependents { .. }) => {
                        eprintln!("Error: {}", e);
                        blocked.push(name.clone());
                    }
                    Err(e) => {
                        // Keep the state in line with whatever was already deleted
                        db::save(&config.install_root, &state)?;
                        return Err(e.into());
                    }
                }
            }

            db::save(&config.install_root, &state)?;

            if !blocked.is_empty() {
                bail!("Could not remove: {}", blocked.join(", "));
            }
            Ok(())
        }
        Some(Commands::Search { query, dist, repo }) => {
            let config = load_config(cli.config)?;
            let client = RepositoryClient::new()?;
            let index = PackageIndex::load(&client, &config, &dist, &repo)?;
            let state = db::load(&config.install_root)?;

            let results = index.search(&query);
            if results.is_empty() {
                println!("No packages found matching \"{}\"", query);
                return Ok(());
            }

            for name in results {
                match state.get(name) {
                    Some(pkg) => println!(
                        "{} [installed, {}]",
                        name,
                        installed_marker(&pkg.dist, &pkg.repo, pkg.explicit)
                    ),
                    None => println!("{}", name),
                }
            }
            Ok(())
        }
        Some(Commands::List) => {
            let config = load_config(cli.config)?;
            let state = db::load(&config.install_root)?;

            if state.is_empty() {
                println!("No packages installed.");
                return Ok(());
            }

            for (name, pkg) in &state {
                println!("{}, {}", name, installed_marker(&pkg.dist, &pkg.repo, pkg.explicit));
            }
            println!("\nTotal: {} package(s)", state.len());
            Ok(())
        }
        Some(Commands::Update { dist, repo }) => {
            let config = load_config(cli.config)?;
            let client = RepositoryClient::new()?;
            let index = PackageIndex::refresh(&client, &config, &dist, &repo)?;
            println!("Updated {}/{}: {} packages", dist, repo, index.len());
            Ok(())
        }
        Some(Commands::Depends { package_name }) => {
            let config = load_config(cli.config)?;
            let state = db::load(&config.install_root)?;

            let pkg = state
                .get(&package_name)
                .ok_or_else(|| Error::NotInstalled(package_name.clone()))?;

            if pkg.depends.is_empty() {
                println!("{} has no dependencies", package_name);
            } else {
                println!("Dependencies of {}:", package_name);
                for dep in &pkg.depends {
                    let status = if state.contains(dep) { "" } else { " [not installed]" };
                    println!("  {}{}", dep, status);
                }
            }
            Ok(())
        }
        Some(Commands::Rdepends { package_name }) => {
            let config = load_config(cli.config)?;
            let state = db::load(&config.install_root)?;

            if !state.contains(&package_name) {
                return Err(Error::NotInstalled(package_name).into());
            }

            let rdeps = state.reverse_dependencies(&package_name);
            if rdeps.is_empty() {
                println!("Nothing depends on {}", package_name);
            } else {
                println!("Packages depending on {}:", package_name);
                for name in rdeps {
                    println!("  {}", name);
                }
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "debrip", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("debrip v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'debrip --help' for usage information");
            Ok(())
        }
    }
}
