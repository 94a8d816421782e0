// Infrastructure layer - 基础设施层

pub mod metrics;
