use indexmap::IndexMap;

use edgesim_core::Simulation;

use edgesim_cloud::core::common::AllocationVerdict;
use edgesim_cloud::core::config::SimulationConfig;
use edgesim_cloud::core::errors::CloudError;
use edgesim_cloud::core::host::{Host, Pe};
use edgesim_cloud::core::vm::{VirtualMachine, VmStatus};
use edgesim_cloud::core::vm_allocation_policy::VmAllocationPolicy;
use edgesim_cloud::core::vm_scheduler::VmSchedulingPolicy;
use edgesim_cloud::simulation::CloudSimulation;

// Three hosts with 4, 8 and 6 space-shared PEs receive VMs requesting 3, 2 and 2 PEs.
fn place_vms(policy: &str) -> Vec<Option<u32>> {
    let hosts = vec![
        Host::new(0, Pe::list(4, 1000.), 16384., 10000., 1000000.),
        Host::new(1, Pe::list(8, 1000.), 16384., 10000., 1000000.),
        Host::new(2, Pe::list(6, 1000.), 16384., 10000., 1000000.),
    ];
    let sim_config = SimulationConfig {
        vm_allocation_policy: policy.to_string(),
        vm_scheduler: VmSchedulingPolicy::SpaceShared,
        ..SimulationConfig::default()
    };
    let mut cloud_sim = CloudSimulation::new(Simulation::new(123), hosts, sim_config).unwrap();
    cloud_sim
        .submit_vm_list(vec![
            VirtualMachine::new(0, 1000., 3),
            VirtualMachine::new(1, 1000., 2),
            VirtualMachine::new(2, 1000., 2),
        ])
        .unwrap();
    cloud_sim.start().unwrap();
    (0..3).map(|id| cloud_sim.vm(id).unwrap().host()).collect()
}

#[test]
fn test_first_fit() {
    assert_eq!(place_vms("FirstFit"), vec![Some(0), Some(1), Some(1)]);
}

#[test]
fn test_best_fit() {
    assert_eq!(place_vms("BestFit"), vec![Some(0), Some(2), Some(2)]);
}

#[test]
fn test_worst_fit() {
    assert_eq!(place_vms("WorstFit"), vec![Some(1), Some(2), Some(1)]);
}

#[test]
fn test_unknown_policy_is_rejected() {
    let sim_config = SimulationConfig {
        vm_allocation_policy: "Random".to_string(),
        ..SimulationConfig::default()
    };
    let res = CloudSimulation::new(Simulation::new(123), Vec::new(), sim_config);
    assert!(matches!(res, Err(CloudError::Config(_))));
}

#[test]
fn test_space_shared_vm_scheduler_does_not_oversubscribe() {
    for (policy, expected) in [
        (VmSchedulingPolicy::TimeShared, VmStatus::Created),
        (VmSchedulingPolicy::SpaceShared, VmStatus::Failed),
    ] {
        let hosts = vec![Host::new(0, Pe::list(4, 1000.), 8192., 10000., 1000000.).with_vm_scheduler(policy)];
        let mut cloud_sim = CloudSimulation::new(Simulation::new(123), hosts, SimulationConfig::default()).unwrap();
        cloud_sim
            .submit_vm_list(vec![VirtualMachine::new(0, 1000., 3), VirtualMachine::new(1, 1000., 2)])
            .unwrap();
        cloud_sim.start().unwrap();
        assert_eq!(cloud_sim.vm(0).unwrap().status(), VmStatus::Created);
        assert_eq!(cloud_sim.vm(1).unwrap().status(), expected);
    }
}

#[test]
fn test_duplicate_host_ids_are_rejected() {
    let hosts = vec![
        Host::new(0, Pe::list(4, 1000.), 8192., 10000., 1000000.),
        Host::new(0, Pe::list(2, 1000.), 8192., 10000., 1000000.),
    ];
    let res = CloudSimulation::new(Simulation::new(123), hosts, SimulationConfig::default());
    assert!(matches!(res, Err(CloudError::DuplicateId { id: 0, .. })));
}

struct LastFit;

impl VmAllocationPolicy for LastFit {
    fn select_host(&self, vm: &VirtualMachine, hosts: &IndexMap<u32, Host>) -> Option<u32> {
        hosts
            .values()
            .rev()
            .find(|host| host.is_suitable_for_vm(vm) == AllocationVerdict::Success)
            .map(|host| host.id)
    }
}

#[test]
fn test_custom_policy() {
    let hosts = (0..3)
        .map(|id| Host::new(id, Pe::list(4, 1000.), 8192., 10000., 1000000.))
        .collect();
    let mut cloud_sim = CloudSimulation::new(Simulation::new(123), hosts, SimulationConfig::default()).unwrap();
    cloud_sim.datacenter().borrow_mut().set_allocation_policy(Box::new(LastFit));
    cloud_sim.submit_vm_list(vec![VirtualMachine::new(0, 1000., 2)]).unwrap();
    cloud_sim.start().unwrap();
    assert_eq!(cloud_sim.vm(0).unwrap().host(), Some(2));
}
