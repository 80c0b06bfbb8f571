use crate::policy_store::POLICY_STORE;
use tracing::warn;
use vqos_bus::{BusReply, ReplyBody, RpcEnvelope, GET_POLICY_FOR_QOS};

/// Answers one unicast bus call. Version or method skew is refused
/// explicitly so the caller isn't left guessing; it affects that
/// message only.
pub fn handle_bus_call(envelope: &RpcEnvelope) -> BusReply {
    if !envelope.version_matches() {
        warn!(
            "Refusing {} call with unrecognized RPC version {}",
            envelope.method, envelope.version
        );
        return BusReply::new(ReplyBody::Fail(format!(
            "unrecognized RPC version {}",
            envelope.version
        )));
    }
    match envelope.method.as_str() {
        GET_POLICY_FOR_QOS => {
            let Some(qos_id) = envelope.arg("qos_id") else {
                return BusReply::new(ReplyBody::Fail("missing qos_id argument".to_string()));
            };
            match POLICY_STORE.read().get_policy_for_qos(qos_id) {
                Some(attributes) => BusReply::new(ReplyBody::Policy(attributes)),
                None => BusReply::new(ReplyBody::NoSuchPolicy),
            }
        }
        other => {
            warn!("Refusing call for unrecognized method {other}");
            BusReply::new(ReplyBody::Fail(format!("unrecognized method {other}")))
        }
    }
}
