//! Standard simulation events.

// VM ALLOCATION EVENTS ////////////////////////////////////////////////////////////////////////////

pub mod allocation {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct VmCreateRequest {
        pub vm_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct VmCreated {
        pub vm_id: u32,
        pub host_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct VmCreateFailed {
        pub vm_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct VmDestroyRequest {
        pub vm_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct VmDestroyed {
        pub vm_id: u32,
        pub host_id: u32,
    }
}

// CLOUDLET EVENTS /////////////////////////////////////////////////////////////////////////////////

pub mod cloudlet {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct CloudletSubmit {
        pub cloudlet_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct CloudletRejected {
        pub cloudlet_id: u32,
        pub reason: String,
    }

    /// Sent to the broker when a cloudlet reaches a terminal status.
    #[derive(Clone, Serialize)]
    pub struct CloudletReturned {
        pub cloudlet_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct CloudletCancel {
        pub cloudlet_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct CloudletPause {
        pub cloudlet_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct CloudletResume {
        pub cloudlet_id: u32,
    }
}

// PROCESSING EVENTS ///////////////////////////////////////////////////////////////////////////////

pub mod processing {
    use serde::Serialize;

    /// Scheduling tick of the datacenter.
    #[derive(Clone, Serialize)]
    pub struct UpdateProcessing {}
}
