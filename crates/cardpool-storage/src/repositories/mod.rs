pub mod api_call_log;
pub mod device;
pub mod operation_log;
pub mod sim_card;
pub mod sms_record;

pub use api_call_log::{ApiCallLogRepository, SqliteApiCallLogRepository};
pub use device::{DeviceRepository, SqliteDeviceRepository};
pub use operation_log::{OperationLogRepository, SqliteOperationLogRepository};
pub use sim_card::{SimCardRepository, SqliteSimCardRepository};
pub use sms_record::{SmsRecordRepository, SqliteSmsRecordRepository};
