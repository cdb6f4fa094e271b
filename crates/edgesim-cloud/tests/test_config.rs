use std::time::Duration;

use edgesim_core::Simulation;

use edgesim_cloud::core::cloudlet_scheduler::CloudletSchedulingPolicy;
use edgesim_cloud::core::config::SimulationConfig;
use edgesim_cloud::core::errors::CloudError;
use edgesim_cloud::core::vm_scheduler::VmSchedulingPolicy;
use edgesim_cloud::simulation::CloudSimulation;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

#[test]
fn test_full_config() {
    let config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    assert_eq!(config.scheduling_interval, 0.5);
    assert_eq!(config.message_delay, 0.1);
    assert_eq!(config.vm_allocation_policy, "BestFit");
    assert_eq!(config.vm_scheduler, VmSchedulingPolicy::SpaceShared);
    assert_eq!(config.cloudlet_scheduler, CloudletSchedulingPolicy::SpaceShared);
    assert!(config.destroy_idle_vms);
    assert!(config.record_allocations);
    assert_eq!(config.wall_clock_limit, Some(30.));
    assert_eq!(config.wall_clock_limit_duration().unwrap(), Some(Duration::from_secs(30)));
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = SimulationConfig::from_file(&name_wrapper("config_partial.yaml")).unwrap();
    let expected = SimulationConfig {
        message_delay: 0.2,
        vm_allocation_policy: "WorstFit".to_string(),
        ..SimulationConfig::default()
    };
    assert_eq!(config, expected);
}

#[test]
fn test_empty_config_is_default() {
    let config = SimulationConfig::from_yaml("{}").unwrap();
    assert_eq!(config, SimulationConfig::new());
    assert_eq!(config.vm_allocation_policy, "FirstFit");
    assert_eq!(config.wall_clock_limit, None);
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(matches!(
        SimulationConfig::from_file(&name_wrapper("config_invalid.yaml")),
        Err(CloudError::Config(_))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("message_delay: -0.5"),
        Err(CloudError::Config(_))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("wall_clock_limit: .nan"),
        Err(CloudError::Config(_))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("wall_clock_limit: 1e30"),
        Err(CloudError::Config(_))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("vm_allocation_policy: Random"),
        Err(CloudError::Config(_))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("vm_scheduler: Fastest"),
        Err(CloudError::Config(_))
    ));
}

#[test]
fn test_missing_file() {
    let res = SimulationConfig::from_file(&name_wrapper("missing.yaml"));
    assert!(matches!(res, Err(CloudError::Config(msg)) if msg.contains("missing.yaml")));
}

#[test]
fn test_unrepresentable_wall_clock_limit_is_rejected_by_simulation() {
    let sim_config = SimulationConfig {
        wall_clock_limit: Some(1e30),
        ..SimulationConfig::default()
    };
    assert!(matches!(sim_config.wall_clock_limit_duration(), Err(CloudError::Config(_))));
    let res = CloudSimulation::new(Simulation::new(123), Vec::new(), sim_config);
    assert!(matches!(res, Err(CloudError::Config(_))));
}
