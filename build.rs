// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn target_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("dist")
            .long("dist")
            .value_name("DIST")
            .default_value("eoan")
            .help("Distribution to download from"),
    )
    .arg(
        Arg::new("repo")
            .long("repo")
            .value_name("REPO")
            .default_value("main")
            .help("Repository to download from"),
    )
}

fn build_cli() -> Command {
    Command::new("debrip")
        .version(env!("CARGO_PKG_VERSION"))
        .author("debrip Contributors")
        .about("Rip packages from the Ubuntu repos into an unprivileged root")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Config file (default: ~/.config/debrip/debrip.json)"),
        )
        .subcommand(
            target_args(
                Command::new("install")
                    .about("Install packages and their dependencies")
                    .arg(
                        Arg::new("packages")
                            .required(true)
                            .num_args(1..)
                            .help("Packages to install (exact name or unique substring)"),
                    )
                    .arg(
                        Arg::new("system")
                            .long("system")
                            .action(ArgAction::SetTrue)
                            .help("Mark packages as installed by the system"),
                    ),
            ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove packages and dependencies nothing else needs")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .help("Packages to remove"),
                ),
        )
        .subcommand(target_args(
            Command::new("search")
                .about("Search the package index")
                .arg(Arg::new("query").required(true).help("Substring to look for in package names")),
        ))
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(target_args(
            Command::new("update").about("Re-download the package index"),
        ))
        .subcommand(
            Command::new("depends")
                .about("Show dependencies of an installed package")
                .arg(Arg::new("package_name").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("rdepends")
                .about("Show reverse dependencies (what depends on this package)")
                .arg(Arg::new("package_name").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    fs::write(man_dir.join("debrip.1"), buffer).expect("Failed to write man page");
}
