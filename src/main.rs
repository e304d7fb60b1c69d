use color_print::cformat;
use maekawa_sim::driver::print_quorums;
use maekawa_sim::{log, CycleOutcome, Driver, SimulationConfig};
use std::env;
use std::error::Error;
use std::fs;

/// Usage: `maekawa-sim [valid | intersection-invalid | minimality-invalid | <config.json>]`
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = match env::args().nth(1).as_deref() {
        None | Some("valid") => SimulationConfig::valid_five(),
        Some("intersection-invalid") => SimulationConfig::intersection_invalid(),
        Some("minimality-invalid") => SimulationConfig::minimality_invalid(),
        Some(path) => SimulationConfig::from_json_string(&fs::read_to_string(path)?)?,
    };

    log::heading("Maekawa's Algorithm");
    log::info(&cformat!(
        "number of processes: <green>{}</green>",
        config.num_processes
    ));
    log::info(&cformat!(
        "number of critical-section attempts: <green>{}</green>",
        config.accesses
    ));
    print_quorums(&config);

    let driver = Driver::new(config);
    let report = match driver.run().await {
        Ok(report) => report,
        Err(e) => {
            log::error(&e.to_string());
            std::process::exit(1);
        }
    };

    log::heading("Results");
    for outcome in &report.outcomes {
        match outcome {
            CycleOutcome::Granted { process, value } => log::info(&cformat!(
                "process <bold>{}</bold> entered the critical section and wrote <green>{}</green>",
                process,
                value
            )),
            CycleOutcome::Blocked { process } => log::info(&cformat!(
                "<red>process <bold>{}</bold> was blocked</red>",
                process
            )),
        }
    }
    log::info(&cformat!(
        "final shared value: <green>{}</green>",
        report.final_value
    ));
    log::info(&cformat!(
        "peak processes in the critical section: <green>{}</green>",
        report.peak_critical
    ));

    Ok(())
}
