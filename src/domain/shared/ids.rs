use uuid::Uuid;

// Stream ids are derived, never chosen by callers: one result stream per
// (political business, counting circle), one end-result stream and one
// lot-decision stream per subject.

const RESULT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_0c2e_8d44_4b7a_9b61_2f0e_5c3d_a001);
const END_RESULT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_0c2e_8d44_4b7a_9b61_2f0e_5c3d_a002);
const LOT_DECISION_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_0c2e_8d44_4b7a_9b61_2f0e_5c3d_a003);

pub fn counting_circle_result_id(political_business_id: Uuid, counting_circle_id: Uuid) -> Uuid {
    let mut name = [0u8; 32];
    name[..16].copy_from_slice(political_business_id.as_bytes());
    name[16..].copy_from_slice(counting_circle_id.as_bytes());
    Uuid::new_v5(&RESULT_NAMESPACE, &name)
}

pub fn end_result_stream_id(political_business_id: Uuid) -> Uuid {
    Uuid::new_v5(&END_RESULT_NAMESPACE, political_business_id.as_bytes())
}

/// Subject is a proportional election union or a standalone proportional election
pub fn lot_decision_stream_id(subject_id: Uuid) -> Uuid {
    Uuid::new_v5(&LOT_DECISION_NAMESPACE, subject_id.as_bytes())
}
