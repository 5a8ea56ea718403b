//! Pool Mirror: pass-through calls that refresh the local copy, and queries
//! over that copy.
//!
//! Remote responses are returned exactly as received. When one reports
//! success and carries records, an upsert of those records is queued; the
//! caller never waits for it. Relayed SMS are recorded the same way.

use crate::background::{BackgroundQueue, Job};
use cardpool_core::{
    ClientsQuery, DevicesQuery, RemoteDevice, RemoteResponse, RemoteSimCard, RemoteSms,
    SendSmsRequest, SimCardsQuery, SmsQuery,
};
use cardpool_network::{CardPoolApi, RemoteError};
use cardpool_storage::repositories::{
    DeviceRepository, SimCardRepository, SmsRecordRepository, SqliteDeviceRepository,
    SqliteSimCardRepository, SqliteSmsRecordRepository,
};
use cardpool_storage::{Device, Page, SimCard, SmsRecord, SmsStatus, StorageResult};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub struct PoolMirror<R> {
    remote: Arc<R>,
    cards: SqliteSimCardRepository,
    devices: SqliteDeviceRepository,
    sms: SqliteSmsRecordRepository,
    queue: BackgroundQueue,
}

impl<R: CardPoolApi> PoolMirror<R> {
    pub fn new(pool: SqlitePool, remote: Arc<R>, queue: BackgroundQueue) -> Self {
        Self {
            remote,
            cards: SqliteSimCardRepository::new(pool.clone()),
            devices: SqliteDeviceRepository::new(pool.clone()),
            sms: SqliteSmsRecordRepository::new(pool),
            queue,
        }
    }

    /// Proxy `simCardsList`, mirroring the returned page
    pub async fn sim_cards_list(&self, query: &SimCardsQuery) -> Result<RemoteResponse, RemoteError> {
        let response = self.remote.sim_cards_list(query).await?;
        if response.is_success() {
            let cards = RemoteSimCard::from_page(&response.data);
            if !cards.is_empty() {
                debug!(count = cards.len(), "Queueing inventory refresh");
                self.queue.submit(Job::SaveSimCards(cards));
            }
        }
        Ok(response)
    }

    /// Proxy `clients`, mirroring the returned devices
    pub async fn clients(&self, query: &ClientsQuery) -> Result<RemoteResponse, RemoteError> {
        let response = self.remote.clients(query).await?;
        if response.is_success() {
            let devices = RemoteDevice::from_page(&response.data);
            if !devices.is_empty() {
                debug!(count = devices.len(), "Queueing device refresh");
                self.queue.submit(Job::SaveDevices(devices));
            }
        }
        Ok(response)
    }

    /// Proxy `clientsInfo`, mirroring the returned device
    pub async fn clients_info(&self, user_id: &str) -> Result<RemoteResponse, RemoteError> {
        let response = self.remote.clients_info(user_id).await?;
        if response.is_success() {
            if let Some(device) = RemoteDevice::from_info(&response.data) {
                self.queue.submit(Job::SaveDevices(vec![device]));
            }
        }
        Ok(response)
    }

    /// Proxy `simpoolsDeatil`
    pub async fn simpools_detail(&self, mac_address: &str) -> Result<RemoteResponse, RemoteError> {
        self.remote.simpools_detail(mac_address).await
    }

    /// Proxy `getSms`, recording the message it returns
    pub async fn get_sms(&self, user_id: Option<&str>) -> Result<RemoteResponse, RemoteError> {
        let response = self.remote.get_sms(user_id.unwrap_or_default()).await?;
        if response.is_success() {
            if let Some(sms) = RemoteSms::from_payload(&response.data) {
                self.queue.submit(Job::SaveSms(SmsRecord::incoming(user_id, &sms)));
            }
        }
        Ok(response)
    }

    /// Proxy `sendSms`, recording the message once the pool accepts it
    pub async fn send_sms(&self, request: &SendSmsRequest) -> Result<RemoteResponse, RemoteError> {
        let response = self.remote.send_sms(request).await?;
        if response.is_success() {
            self.queue.submit(Job::SaveSms(SmsRecord::outgoing(request, &response)));
        }
        Ok(response)
    }

    /// Proxy `sendResult`, applying the delivery report to the sent message
    pub async fn send_result(&self, msg_id: Option<&str>) -> Result<RemoteResponse, RemoteError> {
        let msg_id = msg_id.map(str::trim).unwrap_or_default();
        let response = self.remote.send_result(msg_id).await?;
        if response.is_success() && !msg_id.is_empty() && !response.data.is_empty() {
            let status = if RemoteSms::delivered(&response.data) {
                SmsStatus::Delivered
            } else {
                SmsStatus::Failed
            };
            debug!(msg_id, status = status.as_str(), "Queueing delivery report");
            self.queue.submit(Job::UpdateSmsStatus {
                msg_id: msg_id.to_string(),
                status,
            });
        }
        Ok(response)
    }

    pub async fn local_sms(&self, query: &SmsQuery) -> StorageResult<Page<SmsRecord>> {
        self.sms.list(query).await
    }

    pub async fn sms_by_msg_id(&self, msg_id: &str) -> StorageResult<Option<SmsRecord>> {
        self.sms.find_by_msg_id(msg_id.trim()).await
    }

    pub async fn local_sim_cards(&self, query: &SimCardsQuery) -> StorageResult<Page<SimCard>> {
        self.cards.list(query).await
    }

    pub async fn sim_card_by_imsi(&self, imsi: &str) -> StorageResult<Option<SimCard>> {
        self.cards.find_by_imsi(imsi.trim()).await
    }

    pub async fn local_devices(&self, query: &DevicesQuery) -> StorageResult<Page<Device>> {
        self.devices.list(query).await
    }

    pub async fn device_by_user_id(&self, user_id: &str) -> StorageResult<Option<Device>> {
        self.devices.find_by_user_id(user_id.trim()).await
    }
}
