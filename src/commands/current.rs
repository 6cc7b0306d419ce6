use crate::runtime::Runtime;
use colored::Colorize;

pub fn execute(runtime: &dyn Runtime) {
    match runtime.probe() {
        Some(version) => println!("{}", version.green()),
        None => println!(
            "No {} version is active. Run 'spark {} use <version>' to pick one.",
            runtime.display_name(),
            runtime.name()
        ),
    }
}
