pub mod api_call_log;
pub mod device;
pub mod operation_log;
pub mod page;
pub mod sim_card;
pub mod sms_record;

pub use api_call_log::{ApiCallLog, CallStatus};
pub use device::Device;
pub use operation_log::{OperationLog, OperationResult, OperationType};
pub use page::{Page, Pageable};
pub use sim_card::{BindingUpdate, SimCard};
pub use sms_record::{SmsRecord, SmsStatus};
