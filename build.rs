// build.rs

//! Renders `man/brigade.1` from the command-line definition.

use clap::CommandFactory;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "src/cli/mod.rs"]
mod cli;

fn render_man_page(out: &Path) -> std::io::Result<()> {
    let mut page = Vec::new();
    clap_mangen::Man::new(cli::Cli::command()).render(&mut page)?;
    std::fs::create_dir_all(out)?;
    std::fs::write(out.join("brigade.1"), page)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/cli/mod.rs");

    let Some(root) = std::env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from) else {
        return;
    };
    if let Err(e) = render_man_page(&root.join("man")) {
        println!("cargo:warning=man page not generated: {}", e);
    }
}
