pub mod alert;
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod inventory;
pub mod notice;
pub mod predict;
pub mod push;
pub mod service;
pub mod time;
pub mod worker;
pub mod workload;

pub use alert::{AlertEvent, AlertFeed, ALERT_FEED_CAP};
pub use api::{report_file_name, ActionResult, DashboardApi, HttpApi};
pub use config::DashboardConfig;
pub use error::DashboardError;
pub use events::{parse_push_message, PushEvent};
pub use inventory::{Inventory, InventoryItem, PartId};
pub use notice::{NoticeKind, Notification};
pub use predict::{
    Assignment, PredictRequest, PredictResponse, QueueInfo, ServiceRequestForm,
};
pub use push::{run_push_channel, PushMessage, ReconnectConfig};
pub use service::{CarDetails, ServiceId, ServiceProgress, ServiceRecord, WorkerAssignment};
pub use worker::{Tier, WorkerId, WorkerSnapshot, WorkerStatus};
pub use workload::{normalize_workload, SummaryStats, Workload, WorkloadReport};
