//! Domain models for the DCM coordination plane.

pub mod action;
pub mod agent_context;
pub mod batch;
pub mod blocking;
pub mod capacity;
pub mod config;
pub mod event;
pub mod message;
pub mod project;
pub mod registry;
pub mod routing;
pub mod session;
pub mod subscription;
pub mod subtask;
pub mod task_list;
pub mod wave;

pub use action::{Action, HourlyActionCount, TokenConsumption, ToolKind};
pub use agent_context::{AgentContext, COMPACT_SNAPSHOT_AGENT_TYPE};
pub use batch::OrchestrationBatch;
pub use blocking::AgentBlocking;
pub use capacity::{AgentCapacity, CapacityZone};
pub use config::{Config, Mode};
pub use event::{BusEvent, EventName};
pub use message::{
    AgentMessage, MessageTopic, MessageView, DEFAULT_MESSAGE_TTL_SECONDS, MAX_MESSAGE_PRIORITY,
    MAX_MESSAGE_TTL_SECONDS, MIN_MESSAGE_PRIORITY, MIN_MESSAGE_TTL_SECONDS,
};
pub use project::{Project, Request, RequestStatus};
pub use registry::AgentRegistryEntry;
pub use routing::{
    clamp_score, normalize_keywords, KeywordToolScore, RoutingFeedback, RoutingStats,
    SuggestFilters, ToolSuggestion, ToolTypeCount, MAX_TOOL_SCORE, MIN_TOOL_SCORE,
};
pub use session::{ActiveAgent, Session, SessionStats};
pub use subscription::TopicSubscription;
pub use subtask::{Subtask, SubtaskStatus, DEFAULT_SUBTASK_PRIORITY};
pub use task_list::{TaskList, TaskListStatus};
pub use wave::{WaveState, WaveStatus};
