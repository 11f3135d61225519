use std::sync::Arc;

use serde_json::json;

use waterline::{
    Engine, EngineConfig, KnowledgeBundle, SessionRegistry, StaticLoader, StopReason,
};

fn bundle() -> KnowledgeBundle {
    serde_json::from_value(json!({
        "clusters": [
            {"cluster_id": "A", "indicates": {"f1": "yes", "f2": "yes"}},
            {"cluster_id": "B", "indicates": {"f1": "no", "f2": "yes"}},
            {"cluster_id": "C", "indicates": {"f1": "no", "f2": "no"}}
        ]
    }))
    .unwrap()
}

async fn loaded_engine() -> Engine {
    let mut engine = Engine::new(EngineConfig::new("KITCHEN").with_top_k(0)).unwrap();
    engine.initialize(&StaticLoader::new(bundle())).await.unwrap();
    engine
}

#[tokio::test]
async fn sessions_are_isolated() {
    let registry = SessionRegistry::new();
    let first = registry.insert(loaded_engine().await).unwrap();
    let second = registry.insert(loaded_engine().await).unwrap();
    assert_ne!(first, second);
    assert_eq!(registry.len().unwrap(), 2);

    registry
        .with_session(first, |engine| engine.update_with_answer("f1", "yes"))
        .unwrap()
        .unwrap();

    let asked_first = registry
        .with_session(first, |engine| engine.session_state().unwrap().questions_asked.clone())
        .unwrap();
    let asked_second = registry
        .with_session(second, |engine| engine.session_state().unwrap().questions_asked.clone())
        .unwrap();
    assert_eq!(asked_first, vec!["f1".to_string()]);
    assert!(asked_second.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dialogues_reach_same_outcome() {
    let registry = Arc::new(SessionRegistry::new());
    let mut ids = Vec::new();
    for _ in 0..8 {
        ids.push(registry.insert(loaded_engine().await).unwrap());
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .with_session(id, |engine| {
                    engine.update_with_answer("f1", "no")?;
                    engine.update_with_answer("f2", "no")?;
                    engine.state_after_last()
                })
                .unwrap()
                .unwrap()
        }));
    }

    let mut fingerprints = Vec::new();
    for handle in handles {
        let state = handle.await.unwrap();
        assert_eq!(state.top().unwrap().id.as_str(), "C");
        // B survives pruning, and both facts are settled.
        assert_eq!(state.stop.reason, Some(StopReason::Exhausted));
        fingerprints.push(state.fingerprint());
    }
    fingerprints.dedup();
    assert_eq!(fingerprints.len(), 1);

    for id in ids {
        assert!(registry.remove(id).unwrap());
    }
    assert!(registry.is_empty().unwrap());
}
