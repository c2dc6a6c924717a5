#![allow(dead_code)]

use osb_broker_core::models::{Errand, OperationData, OperationType};
use proptest::prelude::*;

/// Strategy for generating operation types
pub fn operation_type_strategy() -> impl Strategy<Value = OperationType> {
    prop_oneof![
        Just(OperationType::Create),
        Just(OperationType::Update),
        Just(OperationType::Upgrade),
        Just(OperationType::Delete),
        Just(OperationType::ForceDelete),
        Just(OperationType::Bind),
        Just(OperationType::Unbind),
        Just(OperationType::Recreate),
    ]
}

/// Strategy for generating errands with optional instance filters
pub fn errand_strategy() -> impl Strategy<Value = Errand> {
    (
        "[a-z][a-z0-9-]{0,20}",
        prop::collection::vec("[a-z]{1,8}/[0-9]", 0..3),
    )
        .prop_map(|(name, instances)| Errand::new(name).with_instances(instances))
}

/// Strategy for generating tokens as the broker produces them: single-task
/// tokens, or context tokens carrying a plan and errands
pub fn operation_data_strategy() -> impl Strategy<Value = OperationData> {
    (
        operation_type_strategy(),
        1u64..=u64::from(u32::MAX),
        prop::option::of((
            "[a-f0-9-]{8,36}",
            "[a-z][a-z0-9-]{0,15}",
            prop::option::of(errand_strategy()),
            prop::collection::vec(errand_strategy(), 0..4),
        )),
    )
        .prop_map(|(operation_type, task_id, context)| {
            let data = OperationData::new(operation_type, task_id);
            match context {
                None => data,
                Some((context_id, plan_id, post_deploy, pre_delete)) => {
                    let mut data = data
                        .with_context(context_id)
                        .with_plan(plan_id)
                        .with_pre_delete_errands(pre_delete);
                    data.post_deploy_errand = post_deploy;
                    data
                }
            }
        })
}

/// Strategy for generating non-JSON garbage tokens
pub fn malformed_token_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,40}"
}
