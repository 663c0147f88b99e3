//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用生命周期
//! - 读取标识符列表、建立会话、写出结果文件、输出统计
//!
//! ### `batch_runner` - 批次运行
//! - 每个标识符一个任务流程（JoinSet）
//! - 把事件通道交给完成监视器
//!
//! ### `monitor` - 完成监视器
//! - 独占批次状态，固定周期扫描，只交付一次
//!
//! ### `batch_state` / `aggregator` - 批次状态与结果聚合
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (App)
//!     ↓
//! batch_runner ──spawn──> workflow::JobFlow × N
//!     ↓                         │ JobEvent
//! monitor (BatchState) <────────┘
//!     ↓
//! BatchReport
//! ```

pub mod aggregator;
pub mod batch_processor;
pub mod batch_runner;
pub mod batch_state;
pub mod monitor;

// 重新导出主要类型
pub use aggregator::ResultAggregator;
pub use batch_processor::App;
pub use batch_runner::{run_batch, BatchRunner};
pub use batch_state::{BatchState, StatusCounts};
pub use monitor::CompletionMonitor;
