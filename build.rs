//! Build script that renders the `anf-provision` man pages.
//!
//! One page covers the whole tool and each subcommand gets its own
//! `anf-provision-<subcommand>.1` page, all written to `OUT_DIR`.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const BIN_NAME: &str = "anf-provision";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    render(Man::new(command.clone()), &out_dir.join(format!("{BIN_NAME}.1")))?;
    for subcommand in command.get_subcommands() {
        let page = format!("{BIN_NAME}-{}", subcommand.get_name());
        let man = Man::new(subcommand.clone()).title(page.to_uppercase());
        render(man, &out_dir.join(format!("{page}.1")))?;
    }

    Ok(())
}

fn render(man: Man, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    File::create(path)?.write_all(&buffer)?;
    Ok(())
}
