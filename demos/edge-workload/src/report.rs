//! Presentation of finished tasks.

use std::error::Error;

use serde::Serialize;

use edgesim_cloud::core::cloudlet::CloudletStatus;
use edgesim_cloud::simulation::CloudSimulation;

/// Result of a single task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub cloudlet_id: u32,
    pub status: String,
    pub vm_id: Option<u32>,
    pub host_id: Option<u32>,
    pub start_time: Option<f64>,
    pub finish_time: Option<f64>,
    /// finish time minus start time, only for succeeded tasks
    pub latency: Option<f64>,
}

/// Builds records from the finished task list in the order tasks have finished.
pub fn collect(cloud_sim: &CloudSimulation) -> Vec<TaskRecord> {
    cloud_sim
        .cloudlet_finished_list()
        .into_iter()
        .map(|cloudlet| {
            let host_id = cloudlet.vm().and_then(|vm_id| cloud_sim.vm(vm_id)).and_then(|vm| vm.host());
            let latency = if cloudlet.status() == CloudletStatus::Success {
                cloudlet.execution_time()
            } else {
                None
            };
            TaskRecord {
                cloudlet_id: cloudlet.id,
                status: cloudlet.status().to_string(),
                vm_id: cloudlet.vm(),
                host_id,
                start_time: cloudlet.start_time(),
                finish_time: cloudlet.finish_time(),
                latency,
            }
        })
        .collect()
}

/// Average latency of succeeded tasks.
pub fn average_latency(records: &[TaskRecord]) -> Option<f64> {
    let latencies: Vec<f64> = records.iter().filter_map(|record| record.latency).collect();
    if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
    }
}

fn format_time(time: Option<f64>) -> String {
    time.map_or_else(|| "-".to_string(), |t| format!("{:.2}", t))
}

fn format_id(id: Option<u32>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

pub fn print_table(records: &[TaskRecord]) {
    println!(
        "{:>8} {:>8} {:>4} {:>4} {:>10} {:>10} {:>10}",
        "Task", "Status", "VM", "Host", "Start", "Finish", "Latency"
    );
    for record in records {
        println!(
            "{:>8} {:>8} {:>4} {:>4} {:>10} {:>10} {:>10}",
            record.cloudlet_id,
            record.status,
            format_id(record.vm_id),
            format_id(record.host_id),
            format_time(record.start_time),
            format_time(record.finish_time),
            format_time(record.latency),
        );
    }
    println!("Average latency: {}", format_time(average_latency(records)));
}

pub fn write_csv(records: &[TaskRecord], file_name: &str) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(file_name)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
