//! Edge workload scenario: hosts, VMs and IoT devices submitting tasks.

use std::error::Error;

use serde::Deserialize;

use edgesim_cloud::core::cloudlet::Cloudlet;
use edgesim_cloud::core::host::{Host, Pe};
use edgesim_cloud::core::vm::VirtualMachine;
use edgesim_core::Simulation;
use edgesim_models::UtilizationModel;

fn one() -> u32 {
    1
}

fn default_output_size() -> f64 {
    500.
}

fn default_utilization() -> UtilizationModel {
    UtilizationModel::constant(0.5)
}

/// Group of identical hosts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostSpec {
    #[serde(default = "one")]
    pub count: u32,
    pub pes: u32,
    pub mips: f64,
    pub ram: f64,
    pub bw: f64,
    pub storage: f64,
}

/// Group of identical VMs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VmSpec {
    #[serde(default = "one")]
    pub count: u32,
    pub pes: u32,
    pub mips: f64,
    pub ram: Option<f64>,
    pub bw: Option<f64>,
    pub size: Option<f64>,
}

/// IoT device submitting a single task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceSpec {
    pub id: u32,
    /// size of data uploaded with the task in MB, the task file size is given in KB
    #[serde(default)]
    pub data_size: f64,
    /// size of the task output
    #[serde(default = "default_output_size")]
    pub output_size: f64,
    /// task length in MI
    pub length: f64,
    #[serde(default = "one")]
    pub pes: u32,
    #[serde(default = "default_utilization")]
    pub utilization: UtilizationModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub hosts: Vec<HostSpec>,
    pub vms: Vec<VmSpec>,
    pub devices: Vec<DeviceSpec>,
}

impl Default for Scenario {
    /// Three hosts with 4 PEs, one 2-core VM per host and three devices.
    fn default() -> Self {
        Self {
            hosts: vec![HostSpec {
                count: 3,
                pes: 4,
                mips: 1000.,
                ram: 8192.,
                bw: 10000.,
                storage: 1000000.,
            }],
            vms: vec![VmSpec {
                count: 3,
                pes: 2,
                mips: 1000.,
                ram: Some(4096.),
                bw: Some(1000.),
                size: Some(5000.),
            }],
            devices: [(1, 50., 5000.), (2, 30., 3000.), (3, 100., 8000.)]
                .into_iter()
                .map(|(id, data_size, length)| DeviceSpec {
                    id,
                    data_size,
                    output_size: default_output_size(),
                    length,
                    pes: 1,
                    utilization: default_utilization(),
                })
                .collect(),
        }
    }
}

impl Scenario {
    pub fn from_file(file_name: &str) -> Result<Self, Box<dyn Error>> {
        let content = std::fs::read_to_string(file_name)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn vm_count(&self) -> u32 {
        self.vms.iter().map(|spec| spec.count).sum()
    }

    /// Hosts with sequential ids starting from 0.
    pub fn hosts(&self) -> Vec<Host> {
        self.hosts
            .iter()
            .flat_map(|spec| (0..spec.count).map(move |_| spec))
            .enumerate()
            .map(|(id, spec)| Host::new(id as u32, Pe::list(spec.pes, spec.mips), spec.ram, spec.bw, spec.storage))
            .collect()
    }

    /// VMs with sequential ids starting from 0.
    pub fn vms(&self) -> Vec<VirtualMachine> {
        self.vms
            .iter()
            .flat_map(|spec| (0..spec.count).map(move |_| spec))
            .enumerate()
            .map(|(id, spec)| {
                let mut vm = VirtualMachine::new(id as u32, spec.mips, spec.pes);
                if let Some(ram) = spec.ram {
                    vm = vm.with_ram(ram);
                }
                if let Some(bw) = spec.bw {
                    vm = vm.with_bw(bw);
                }
                if let Some(size) = spec.size {
                    vm = vm.with_size(size);
                }
                vm
            })
            .collect()
    }

    /// One task per device, device `id` is served by VM `id % vm_count`.
    pub fn cloudlets(&self) -> Result<Vec<Cloudlet>, Box<dyn Error>> {
        let vm_count = self.vm_count();
        if vm_count == 0 && !self.devices.is_empty() {
            return Err("scenario has devices but no VMs".into());
        }
        Ok(self
            .devices
            .iter()
            .map(|device| {
                Cloudlet::new(device.id, device.length, device.pes)
                    .with_file_size(device.data_size * 1024.)
                    .with_output_size(device.output_size)
                    .with_utilization(device.utilization.clone())
                    .with_vm(device.id % vm_count)
            })
            .collect())
    }

    /// Adds devices with random task lengths and data sizes drawn from the simulation RNG.
    pub fn add_random_devices(&mut self, count: u32, sim: &mut Simulation) {
        let mut next_id = self.devices.iter().map(|device| device.id + 1).max().unwrap_or(0);
        for _ in 0..count {
            let length: u32 = sim.gen_range(1..=10);
            let data_size: u32 = sim.gen_range(10..=100);
            self.devices.push(DeviceSpec {
                id: next_id,
                data_size: data_size as f64,
                output_size: default_output_size(),
                length: length as f64 * 1000.,
                pes: 1,
                utilization: default_utilization(),
            });
            next_id += 1;
        }
    }
}
