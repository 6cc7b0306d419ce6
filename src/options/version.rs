use crate::runtime::{self, Platform};
use colored::Colorize;

pub fn show() {
    let host = Platform::host();
    let modules: Vec<&str> = runtime::all().iter().map(|runtime| runtime.name()).collect();

    println!("spark {}", env!("CARGO_PKG_VERSION").bright_green());
    println!("platform: {}/{}", host.os, host.arch);
    println!("modules:  {}", modules.join(", ").bright_blue());
}
