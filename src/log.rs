//! Colored console tracing. A pure observer of the simulation: nothing in
//! the protocol depends on what is printed here.

use color_print::cprintln;

pub fn info(message: &str) {
    cprintln!("<green, bold>info</> {}", message);
}

pub fn debug(message: &str) {
    cprintln!("<blue, bold>debug</> {}", message);
}

pub fn error(message: &str) {
    cprintln!("<red, bold>error</> {}", message);
}

/// Prints a section heading the way the original console output framed its
/// banner and quorum table.
pub fn heading(title: &str) {
    cprintln!("<magenta, bold>-------------------</>");
    cprintln!("<magenta, bold>{}</>", title);
    cprintln!("<magenta, bold>-------------------</>");
}
