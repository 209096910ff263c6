//! Event payloads
//!
//! `NsmfEventExposureNotification` arrives from the SMF (TS 29.508), and
//! `EventNotification` is what the gateway forwards to the AF (TS 29.522).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Notification posted by the SMF to the gateway's notification endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsmfEventExposureNotification {
    /// Correlation id previously handed to the core network
    #[serde(default)]
    pub notif_id: String,
    #[serde(default)]
    pub event_notifs: Vec<EventNotificationRecord>,
}

impl NsmfEventExposureNotification {
    /// First record carrying the given event name.
    pub fn find_event(&self, event: &str) -> Option<&EventNotificationRecord> {
        self.event_notifs.iter().find(|record| record.event == event)
    }
}

/// One entry of `eventNotifs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotificationRecord {
    #[serde(default)]
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dnai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dnai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ue_ipv4_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ue_ipv6_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ue_ipv4_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ue_ipv6_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tra_routing: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_tra_routing: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ue_mac: Option<String>,
}

/// Event delivered to the AF's notification destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub af_trans_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_traffic_route: Option<Value>,
    pub subscribed_event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_traffic_route: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dnai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dnai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ue_ipv4_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ue_ipv6_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt_ue_ipv4_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt_ue_ipv6_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ue_mac: Option<String>,
}

impl EventNotification {
    /// Translate an SMF record into the AF-facing event.
    pub fn from_record(
        af_trans_id: Option<String>,
        subscribed_event: &str,
        record: &EventNotificationRecord,
    ) -> Self {
        Self {
            af_trans_id,
            dnai_chg_type: record.dnai_chg_type.clone(),
            source_traffic_route: record.source_tra_routing.clone(),
            subscribed_event: subscribed_event.to_string(),
            target_traffic_route: record.target_tra_routing.clone(),
            source_dnai: record.source_dnai.clone(),
            target_dnai: record.target_dnai.clone(),
            gpsi: record.gpsi.clone(),
            src_ue_ipv4_addr: record.source_ue_ipv4_addr.clone(),
            src_ue_ipv6_prefix: record.source_ue_ipv6_prefix.clone(),
            tgt_ue_ipv4_addr: record.target_ue_ipv4_addr.clone(),
            tgt_ue_ipv6_prefix: record.target_ue_ipv6_prefix.clone(),
            ue_mac: record.ue_mac.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_smf_notification() {
        let notif: NsmfEventExposureNotification = serde_json::from_value(json!({
            "notifId": "2020",
            "eventNotifs": [
                {"event": "QOS_MON", "timeStamp": "2020-01-01T00:00:00Z"},
                {
                    "event": "UP_PATH_CH",
                    "dnaiChgType": "EARLY",
                    "sourceDnai": "edge-1",
                    "targetDnai": "edge-2",
                    "sourceUeIpv4Addr": "10.0.0.1",
                    "targetTraRouting": {"ipv4Addr": "10.9.9.9"}
                }
            ]
        }))
        .unwrap();

        assert_eq!(notif.notif_id, "2020");
        let record = notif.find_event("UP_PATH_CH").unwrap();
        assert_eq!(record.target_dnai.as_deref(), Some("edge-2"));
        assert!(notif.find_event("UE_IP_CH").is_none());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let notif: NsmfEventExposureNotification = serde_json::from_value(json!({})).unwrap();
        assert!(notif.notif_id.is_empty());
        assert!(notif.event_notifs.is_empty());
    }

    #[test]
    fn test_event_notification_from_record() {
        let record = EventNotificationRecord {
            event: "UP_PATH_CH".to_string(),
            dnai_chg_type: Some("LATE".to_string()),
            source_ue_ipv4_addr: Some("10.0.0.1".to_string()),
            target_ue_ipv6_prefix: Some("2001:db8::/64".to_string()),
            source_tra_routing: Some(json!({"ipv4Addr": "10.1.1.1"})),
            ue_mac: Some("00:11:22:33:44:55".to_string()),
            ..EventNotificationRecord::default()
        };

        let event = EventNotification::from_record(Some("t1".to_string()), "UP_PATH_CHANGE", &record);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["afTransId"], json!("t1"));
        assert_eq!(value["subscribedEvent"], json!("UP_PATH_CHANGE"));
        assert_eq!(value["dnaiChgType"], json!("LATE"));
        assert_eq!(value["srcUeIpv4Addr"], json!("10.0.0.1"));
        assert_eq!(value["tgtUeIpv6Prefix"], json!("2001:db8::/64"));
        assert_eq!(value["sourceTrafficRoute"], json!({"ipv4Addr": "10.1.1.1"}));
        assert_eq!(value["ueMac"], json!("00:11:22:33:44:55"));
        assert!(value.get("targetTrafficRoute").is_none());
    }
}
