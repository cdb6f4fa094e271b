mod report;
mod scenario;

use std::error::Error;

use clap::Parser;
use log::info;

use edgesim_cloud::core::config::SimulationConfig;
use edgesim_cloud::simulation::CloudSimulation;
use edgesim_core::Simulation;

use crate::scenario::Scenario;

#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
struct Args {
    /// Scenario file (built-in three-host scenario is used if absent)
    #[clap(short, long)]
    scenario: Option<String>,

    /// Simulation config file
    #[clap(short, long)]
    config: Option<String>,

    /// Output CSV file with task results
    #[clap(short, long)]
    output: Option<String>,

    /// Random seed
    #[clap(long, default_value = "123")]
    seed: u64,

    /// Number of devices with random tasks added to the scenario
    #[clap(long, default_value = "0")]
    extra_devices: u32,
}

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut scenario = match &args.scenario {
        Some(file_name) => Scenario::from_file(file_name)?,
        None => Scenario::default(),
    };
    let sim_config = match &args.config {
        Some(file_name) => SimulationConfig::from_file(file_name)?,
        None => SimulationConfig::default(),
    };

    let mut sim = Simulation::new(args.seed);
    scenario.add_random_devices(args.extra_devices, &mut sim);

    let mut cloud_sim = CloudSimulation::new(sim, scenario.hosts(), sim_config)?;
    cloud_sim.submit_vm_list(scenario.vms())?;
    cloud_sim.submit_cloudlet_list(scenario.cloudlets()?)?;
    let end_time = cloud_sim.start()?;
    info!(
        "Simulation finished at {:.3} after {} events",
        end_time,
        cloud_sim.event_count()
    );
    for failure in cloud_sim.broker().borrow().failures() {
        info!("Failure: {}", failure);
    }

    let records = report::collect(&cloud_sim);
    report::print_table(&records);
    if let Some(file_name) = &args.output {
        report::write_csv(&records, file_name)?;
        info!("Results written to {}", file_name);
    }
    Ok(())
}

fn main() {
    init_logger();
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
