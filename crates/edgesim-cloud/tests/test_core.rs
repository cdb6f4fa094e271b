use approx::assert_relative_eq;

use edgesim_core::Simulation;
use edgesim_models::UtilizationModel;

use edgesim_cloud::core::cloudlet::{Cloudlet, CloudletStatus};
use edgesim_cloud::core::common::EntityKind;
use edgesim_cloud::core::config::SimulationConfig;
use edgesim_cloud::core::errors::CloudError;
use edgesim_cloud::core::host::{Host, Pe};
use edgesim_cloud::core::vm::{VirtualMachine, VmStatus};
use edgesim_cloud::simulation::CloudSimulation;

// Device ID, Data Size (MB), Processing Demand (MI)
const IOT_DEVICES: [(u32, f64, f64); 3] = [(1, 50., 5000.), (2, 30., 3000.), (3, 100., 8000.)];

fn edge_hosts() -> Vec<Host> {
    (0..3)
        .map(|id| Host::new(id, Pe::list(4, 1000.), 8192., 10000., 1000000.))
        .collect()
}

fn edge_vms() -> Vec<VirtualMachine> {
    (0..3)
        .map(|id| {
            VirtualMachine::new(id, 1000., 2)
                .with_ram(4096.)
                .with_bw(1000.)
                .with_size(5000.)
        })
        .collect()
}

fn iot_tasks() -> Vec<Cloudlet> {
    IOT_DEVICES
        .iter()
        .map(|(id, data_size, demand)| {
            Cloudlet::new(*id, *demand, 1)
                .with_file_size(data_size * 1024.)
                .with_output_size(500.)
                .with_utilization(UtilizationModel::constant(0.5))
                .with_vm(id % 3)
        })
        .collect()
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn edge_simulation(sim_config: SimulationConfig) -> CloudSimulation {
    init_logger();
    let mut cloud_sim = CloudSimulation::new(Simulation::new(123), edge_hosts(), sim_config).unwrap();
    cloud_sim.submit_vm_list(edge_vms()).unwrap();
    cloud_sim.submit_cloudlet_list(iot_tasks()).unwrap();
    cloud_sim
}

fn single_host_simulation(pes: u32, sim_config: SimulationConfig) -> CloudSimulation {
    init_logger();
    let hosts = vec![Host::new(0, Pe::list(pes, 1000.), 8192., 10000., 1000000.)];
    CloudSimulation::new(Simulation::new(123), hosts, sim_config).unwrap()
}

fn timeline(cloud_sim: &CloudSimulation) -> Vec<(u32, Option<f64>, Option<f64>)> {
    cloud_sim
        .cloudlet_finished_list()
        .iter()
        .map(|c| (c.id, c.start_time(), c.finish_time()))
        .collect()
}

#[test]
fn test_edge_scenario() {
    let mut cloud_sim = edge_simulation(SimulationConfig::default());
    let end_time = cloud_sim.start().unwrap();
    assert_eq!(end_time, 16.);

    // first fit: two VMs fill the RAM of the first host
    assert_eq!(cloud_sim.vm(0).unwrap().host(), Some(0));
    assert_eq!(cloud_sim.vm(1).unwrap().host(), Some(0));
    assert_eq!(cloud_sim.vm(2).unwrap().host(), Some(1));
    let broker = cloud_sim.broker();
    assert_eq!(broker.borrow().vm_created_list(), &[0, 1, 2]);
    assert!(broker.borrow().vm_waiting_list().is_empty());
    assert!(broker.borrow().failures().is_empty());

    let finished = cloud_sim.cloudlet_finished_list();
    assert_eq!(finished.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1, 3]);
    for cloudlet in finished.iter() {
        assert_eq!(cloudlet.status(), CloudletStatus::Success);
        assert_eq!(cloudlet.start_time(), Some(0.));
        assert_eq!(cloudlet.finished_instructions(), cloudlet.length);
    }
    let latency = |id: u32| finished.iter().find(|c| c.id == id).and_then(|c| c.execution_time());
    assert_eq!(latency(1), Some(10.));
    assert_eq!(latency(2), Some(6.));
    assert_eq!(latency(3), Some(16.));
}

#[test]
fn test_finished_list_is_idempotent() {
    let mut cloud_sim = edge_simulation(SimulationConfig::default());
    cloud_sim.start().unwrap();
    let first = timeline(&cloud_sim);
    let second = timeline(&cloud_sim);
    assert_eq!(first, second);
    assert_eq!(cloud_sim.broker().borrow().cloudlet_finished_ids(), &[2, 1, 3]);
}

#[test]
fn test_runs_are_deterministic() {
    let mut sim1 = edge_simulation(SimulationConfig::default());
    let mut sim2 = edge_simulation(SimulationConfig::default());
    sim1.start().unwrap();
    sim2.start().unwrap();
    assert_eq!(timeline(&sim1), timeline(&sim2));
    assert_eq!(sim1.event_count(), sim2.event_count());
}

#[test]
fn test_message_delay_shifts_start_times() {
    let sim_config = SimulationConfig {
        message_delay: 0.1,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = edge_simulation(sim_config);
    cloud_sim.start().unwrap();
    for cloudlet in cloud_sim.cloudlet_finished_list() {
        assert_relative_eq!(cloudlet.start_time().unwrap(), 0.3, epsilon = 1e-9);
    }
    let latency = cloud_sim.cloudlet(3).unwrap().execution_time().unwrap();
    assert_relative_eq!(latency, 16., epsilon = 1e-9);
}

#[test]
fn test_unplaceable_vm_never_runs_its_cloudlets() {
    let mut cloud_sim = single_host_simulation(2, SimulationConfig::default());
    cloud_sim
        .submit_vm_list(vec![VirtualMachine::new(0, 1000., 2), VirtualMachine::new(1, 1000., 4)])
        .unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![
            Cloudlet::new(0, 1000., 1).with_vm(0),
            Cloudlet::new(1, 1000., 1).with_vm(1),
        ])
        .unwrap();
    assert_eq!(cloud_sim.start().unwrap(), 1.);

    assert_eq!(cloud_sim.vm(1).unwrap().status(), VmStatus::Failed);
    let broker = cloud_sim.broker();
    let broker = broker.borrow();
    assert_eq!(broker.vm_waiting_list(), &[1]);
    assert_eq!(broker.cloudlet_waiting_list(), &[1]);
    assert_eq!(broker.cloudlet_finished_ids(), &[0]);
    assert!(matches!(broker.failures(), [CloudError::NoSuitableHost { vm_id: 1 }]));
    assert_eq!(cloud_sim.cloudlet(1).unwrap().status(), CloudletStatus::Created);
}

#[test]
fn test_invalid_utilization_aborts_run() {
    let mut cloud_sim = single_host_simulation(2, SimulationConfig::default());
    cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 2)]).unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![Cloudlet::new(0, 1000., 1)
            .with_vm(0)
            .with_utilization(UtilizationModel::constant(1.5))])
        .unwrap();
    let res = cloud_sim.start();
    assert!(matches!(
        res,
        Err(CloudError::CapacityExceeded {
            kind: EntityKind::Vm,
            id: 0,
            ..
        })
    ));
}

#[test]
fn test_submission_validation() {
    let mut cloud_sim = single_host_simulation(2, SimulationConfig::default());
    assert!(matches!(
        cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 0)]),
        Err(CloudError::VmConfiguration { vm_id: 0, .. })
    ));
    assert!(matches!(
        cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 1), VirtualMachine::new(0, 500., 1)]),
        Err(CloudError::DuplicateId {
            kind: EntityKind::Vm,
            id: 0
        })
    ));
    cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 1)]).unwrap();

    let cases = vec![
        Cloudlet::new(1, 1000., 1),
        Cloudlet::new(2, 1000., 1).with_vm(5),
        Cloudlet::new(3, 1000., 0).with_vm(0),
        Cloudlet::new(4, 0., 1).with_vm(0),
        Cloudlet::new(5, 1000., 1).with_vm(0).with_submission_delay(-1.),
    ];
    for cloudlet in cases {
        let id = cloudlet.id;
        let res = cloud_sim.submit_cloudlet_list(vec![Cloudlet::new(10, 1000., 1).with_vm(0), cloudlet]);
        assert!(matches!(res, Err(CloudError::TaskConfiguration { cloudlet_id, .. }) if cloudlet_id == id));
    }
    // rejected lists are not registered partially
    assert!(cloud_sim.cloudlet(10).is_none());
    assert!(cloud_sim.broker().borrow().cloudlet_waiting_list().is_empty());

    cloud_sim
        .submit_cloudlet_list(vec![Cloudlet::new(10, 1000., 1).with_vm(0)])
        .unwrap();
    assert!(matches!(
        cloud_sim.submit_cloudlet_list(vec![Cloudlet::new(10, 1000., 1).with_vm(0)]),
        Err(CloudError::DuplicateId {
            kind: EntityKind::Cloudlet,
            id: 10
        })
    ));
}

#[test]
fn test_cancel_waiting_and_running_cloudlets() {
    let sim_config = SimulationConfig {
        scheduling_interval: 1.,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = single_host_simulation(1, sim_config);
    cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 1)]).unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![
            Cloudlet::new(0, 10000., 1).with_vm(0),
            Cloudlet::new(1, 1000., 1).with_vm(0),
        ])
        .unwrap();

    // waiting cloudlet fails immediately
    cloud_sim.cancel_cloudlet(1).unwrap();
    assert_eq!(cloud_sim.cloudlet(1).unwrap().status(), CloudletStatus::Failed);

    cloud_sim.step_for_duration(4.).unwrap();
    assert_eq!(cloud_sim.current_time(), 4.);
    cloud_sim.cancel_cloudlet(0).unwrap();
    assert_eq!(cloud_sim.start().unwrap(), 4.);

    let cancelled = cloud_sim.cloudlet(0).unwrap();
    assert_eq!(cancelled.status(), CloudletStatus::Failed);
    assert_eq!(cancelled.finish_time(), Some(4.));
    assert_relative_eq!(cancelled.finished_instructions(), 4000.);
    assert_eq!(cloud_sim.broker().borrow().cloudlet_finished_ids(), &[1, 0]);

    assert!(matches!(
        cloud_sim.cancel_cloudlet(0),
        Err(CloudError::InvalidTransition { cloudlet_id: 0, .. })
    ));
    assert!(matches!(
        cloud_sim.cancel_cloudlet(7),
        Err(CloudError::UnknownEntity {
            kind: EntityKind::Cloudlet,
            id: 7
        })
    ));
}

#[test]
fn test_cancel_cloudlet_in_transit() {
    let mut cloud_sim = single_host_simulation(1, SimulationConfig::default());
    cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 1)]).unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![Cloudlet::new(0, 1000., 1).with_vm(0).with_submission_delay(5.)])
        .unwrap();

    // vm is created, the cloudlet is on its way to the datacenter
    assert!(cloud_sim.step_for_duration(1.).unwrap());
    assert_eq!(cloud_sim.vm(0).unwrap().status(), VmStatus::Created);
    assert_eq!(cloud_sim.broker().borrow().cloudlet_submitted_list(), &[0]);
    assert_eq!(cloud_sim.cloudlet(0).unwrap().status(), CloudletStatus::Created);

    cloud_sim.cancel_cloudlet(0).unwrap();
    assert_eq!(cloud_sim.start().unwrap(), 0.);

    let cancelled = cloud_sim.cloudlet(0).unwrap();
    assert_eq!(cancelled.status(), CloudletStatus::Failed);
    assert_eq!(cancelled.start_time(), None);
    assert_eq!(cancelled.finish_time(), Some(0.));
    assert_eq!(cancelled.finished_instructions(), 0.);
    assert!(cloud_sim.vm(0).unwrap().cloudlets().is_empty());
    let broker = cloud_sim.broker();
    assert_eq!(broker.borrow().cloudlet_finished_ids(), &[0]);
    assert!(broker.borrow().cloudlet_submitted_list().is_empty());
}

#[test]
fn test_submission_delays() {
    let sim_config = SimulationConfig {
        message_delay: 0.5,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = single_host_simulation(4, sim_config);
    cloud_sim
        .submit_vm_list(vec![VirtualMachine::new(0, 1000., 2).with_submission_delay(2.)])
        .unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![Cloudlet::new(0, 5000., 1).with_vm(0).with_submission_delay(3.)])
        .unwrap();
    // vm request arrives at 2.5, the broker learns about the vm at 3, the cloudlet arrives at 6.5
    assert_eq!(cloud_sim.start().unwrap(), 12.);
    assert_eq!(cloud_sim.vm(0).unwrap().creation_time(), Some(2.5));
    let cloudlet = cloud_sim.cloudlet(0).unwrap();
    assert_eq!(cloudlet.status(), CloudletStatus::Success);
    assert_eq!(cloudlet.start_time(), Some(6.5));
    assert_eq!(cloudlet.finish_time(), Some(11.5));
}

#[test]
fn test_pause_and_resume() {
    let sim_config = SimulationConfig {
        scheduling_interval: 1.,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = single_host_simulation(2, sim_config);
    cloud_sim
        .submit_vm_list(vec![VirtualMachine::new(0, 1000., 1), VirtualMachine::new(1, 1000., 1)])
        .unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![
            Cloudlet::new(0, 10000., 1).with_vm(0),
            Cloudlet::new(1, 20000., 1).with_vm(1),
        ])
        .unwrap();

    cloud_sim.step_for_duration(4.).unwrap();
    cloud_sim.pause_cloudlet(0).unwrap();
    cloud_sim.step_for_duration(3.).unwrap();
    assert_eq!(cloud_sim.current_time(), 7.);
    let paused = cloud_sim.cloudlet(0).unwrap();
    assert_eq!(paused.status(), CloudletStatus::Paused);
    assert_relative_eq!(paused.finished_instructions(), 4000.);
    assert!(matches!(
        cloud_sim.pause_cloudlet(0),
        Err(CloudError::InvalidTransition { cloudlet_id: 0, .. })
    ));

    cloud_sim.resume_cloudlet(0).unwrap();
    assert_eq!(cloud_sim.start().unwrap(), 20.);
    let resumed = cloud_sim.cloudlet(0).unwrap();
    assert_eq!(resumed.status(), CloudletStatus::Success);
    assert_eq!(resumed.start_time(), Some(0.));
    assert_relative_eq!(resumed.finish_time().unwrap(), 13.);
    assert_eq!(cloud_sim.broker().borrow().cloudlet_finished_ids(), &[0, 1]);
    assert!(cloud_sim.resume_cloudlet(0).is_err());
}

#[test]
fn test_idle_vms_are_destroyed() {
    let sim_config = SimulationConfig {
        destroy_idle_vms: true,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = edge_simulation(sim_config);
    assert_eq!(cloud_sim.start().unwrap(), 16.);
    let destroyed_at = |id: u32| {
        let vm = cloud_sim.vm(id).unwrap();
        assert_eq!(vm.status(), VmStatus::Destroyed);
        vm.destruction_time()
    };
    assert_eq!(destroyed_at(0), Some(16.));
    assert_eq!(destroyed_at(1), Some(10.));
    assert_eq!(destroyed_at(2), Some(6.));
    assert!(cloud_sim.broker().borrow().vm_created_list().is_empty());
    let datacenter = cloud_sim.datacenter();
    assert!(datacenter.borrow().hosts().all(|host| host.vms().is_empty()));
    assert_eq!(datacenter.borrow().host(0).unwrap().available_ram(), 8192.);
}

#[test]
fn test_waiting_vms_are_resubmitted_explicitly() {
    let sim_config = SimulationConfig {
        destroy_idle_vms: true,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = single_host_simulation(2, sim_config);
    cloud_sim
        .submit_vm_list(vec![VirtualMachine::new(0, 1000., 2), VirtualMachine::new(1, 1000., 2).with_ram(8000.)])
        .unwrap();
    cloud_sim
        .submit_cloudlet_list(vec![
            Cloudlet::new(0, 2000., 1).with_vm(0),
            Cloudlet::new(1, 1000., 1).with_vm(1),
        ])
        .unwrap();
    assert_eq!(cloud_sim.start().unwrap(), 2.);
    assert_eq!(cloud_sim.vm(1).unwrap().status(), VmStatus::Failed);

    assert_eq!(cloud_sim.resubmit_waiting_vms().unwrap(), 1);
    assert_eq!(cloud_sim.start().unwrap(), 3.);
    let cloudlet = cloud_sim.cloudlet(1).unwrap();
    assert_eq!(cloudlet.status(), CloudletStatus::Success);
    assert_eq!(cloudlet.start_time(), Some(2.));
    assert_eq!(cloudlet.finish_time(), Some(3.));
    assert_eq!(cloud_sim.broker().borrow().cloudlet_finished_ids(), &[0, 1]);
}
