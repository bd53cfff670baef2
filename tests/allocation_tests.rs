use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use collection_codes::config::AllocationConfig;
use collection_codes::models::{CodedEntity, EntityKind, EntityPayload, NewCodedEntity, ParentRef};
use collection_codes::repositories::MemoryCodeStore;
use collection_codes::services::{AllocationService, InvalidReason};
use collection_codes::utils::AllocationError;

fn service_with(store: &MemoryCodeStore, max_attempts: u32) -> AllocationService {
    AllocationService::new(
        Arc::new(store.clone()),
        AllocationConfig {
            max_attempts,
            base_backoff: Duration::from_millis(1),
        },
    )
}

/// Localidade "03" con secao "0301"
async fn seed_secao(service: &AllocationService) -> CodedEntity {
    let localidade = service
        .register_localidade("03", EntityPayload::named("Centro"))
        .await
        .unwrap();
    service
        .register_secao(localidade.id, "01", EntityPayload::named("Secao Norte"))
        .await
        .unwrap()
}

fn child_of(parent: &CodedEntity) -> ParentRef {
    ParentRef::new(parent.kind, parent.id)
}

#[tokio::test]
async fn test_full_hierarchy_codes() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;
    assert_eq!(secao.code, "0301");

    let rota1 = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 1"))
        .await
        .unwrap();
    let rota2 = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 2"))
        .await
        .unwrap();
    assert_eq!(rota1.code, "030101");
    assert_eq!(rota2.code, "030102");
    assert_eq!(rota2.sequence, Some(2));

    let ponto = service
        .create_coded_entity(child_of(&rota1), EntityPayload::named("Ponto 1"))
        .await
        .unwrap();
    assert_eq!(ponto.code, "03010101");

    let operador = service
        .create_coded_entity(child_of(&ponto), EntityPayload::named("Operador 1"))
        .await
        .unwrap();
    assert_eq!(operador.code, "0301010101");
    assert_eq!(operador.kind, EntityKind::Operador);

    let segments = AllocationService::decompose(&operador.code).unwrap();
    assert_eq!(segments.parent_code(), ponto.code);
}

#[tokio::test]
async fn test_sequences_are_scoped_per_parent() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;

    let rota1 = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 1"))
        .await
        .unwrap();
    let rota2 = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 2"))
        .await
        .unwrap();

    let ponto_a = service
        .create_coded_entity(child_of(&rota1), EntityPayload::named("A"))
        .await
        .unwrap();
    let ponto_b = service
        .create_coded_entity(child_of(&rota2), EntityPayload::named("B"))
        .await
        .unwrap();
    assert_eq!(ponto_a.code, "03010101");
    assert_eq!(ponto_b.code, "03010201");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creations_get_distinct_consecutive_codes() {
    const CALLERS: u8 = 24;

    let store = MemoryCodeStore::new();
    let service = AllocationService::new(Arc::new(store.clone()), AllocationConfig::default());
    let secao = seed_secao(&service).await;
    let parent = child_of(&secao);

    let tasks = (0..CALLERS).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_coded_entity(parent, EntityPayload::named(format!("Rota {}", i)))
                .await
        })
    });

    let mut rotas = Vec::new();
    for result in join_all(tasks).await {
        let rota = result.expect("task panicked").expect("allocation failed");
        rotas.push(rota);
    }

    // Sin duplicados ni huecos: exactamente 01..=N
    rotas.sort_by_key(|rota| rota.sequence);
    let sequences: Vec<Option<u8>> = rotas.iter().map(|rota| rota.sequence).collect();
    let expected: Vec<Option<u8>> = (1..=CALLERS).map(Some).collect();
    assert_eq!(sequences, expected);
    for rota in &rotas {
        let sequence = rota.sequence.unwrap();
        assert_eq!(rota.code, format!("0301{:02}", sequence));
    }

    // Un solo escritor por ámbito: las secuencias crecen en orden de confirmación
    for pair in rotas.windows(2) {
        assert!(
            pair[0].created_at <= pair[1].created_at,
            "{} was stored after {}",
            pair[0].code,
            pair[1].code
        );
    }

    let preview = service.preview_next_code(parent).await.unwrap();
    assert_eq!(preview.sequence, u32::from(CALLERS) + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creations_across_parents() {
    let store = MemoryCodeStore::new();
    let service = AllocationService::new(Arc::new(store.clone()), AllocationConfig::default());
    let secao = seed_secao(&service).await;

    let mut rotas = Vec::new();
    for i in 0..4 {
        let rota = service
            .create_coded_entity(child_of(&secao), EntityPayload::named(format!("Rota {}", i)))
            .await
            .unwrap();
        rotas.push(rota);
    }

    let tasks = rotas.iter().flat_map(|rota| {
        let parent = child_of(rota);
        let service = service.clone();
        (0..6).map(move |_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create_coded_entity(parent, EntityPayload::named("Ponto"))
                    .await
            })
        })
    });

    let mut codes = HashSet::new();
    for result in join_all(tasks.collect::<Vec<_>>()).await {
        let ponto = result.unwrap().unwrap();
        assert!(codes.insert(ponto.code));
    }

    let expected: HashSet<String> = rotas
        .iter()
        .flat_map(|rota| (1..=6).map(move |n| format!("{}{:02}", rota.code, n)))
        .collect();
    assert_eq!(codes, expected);
}

#[tokio::test]
async fn test_hundredth_child_is_rejected() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;

    for n in 1..=99 {
        let rota = service
            .create_coded_entity(child_of(&secao), EntityPayload::named(&format!("Rota {}", n)))
            .await
            .unwrap();
        assert_eq!(rota.code, format!("0301{:02}", n));
    }

    let result = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 100"))
        .await;
    assert!(matches!(
        result,
        Err(AllocationError::SequenceExhausted { ref parent_code, max: 99 }) if parent_code == "0301"
    ));

    // El intento fallido no deja rastro
    let preview = service.preview_next_code(child_of(&secao)).await;
    assert!(matches!(preview, Err(AllocationError::SequenceExhausted { .. })));
}

#[tokio::test]
async fn test_deactivated_code_stays_taken() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;
    let rota = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 1"))
        .await
        .unwrap();

    let deactivated = service.set_active(rota.id, false).await.unwrap();
    assert!(!deactivated.active);

    let outcome = service.validate("030101", EntityKind::Rota).await.unwrap();
    assert!(!outcome.valid);
    assert_eq!(outcome.reason, Some(InvalidReason::DuplicateCode));

    // Nunca se reutiliza el número de un hijo desactivado
    let next = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota 2"))
        .await
        .unwrap();
    assert_eq!(next.code, "030102");
}

#[tokio::test]
async fn test_missing_or_inactive_parent() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);

    let missing = ParentRef::new(EntityKind::Secao, Uuid::new_v4());
    let result = service
        .create_coded_entity(missing, EntityPayload::named("Huérfana"))
        .await;
    assert!(matches!(result, Err(AllocationError::ParentNotFound { .. })));

    let secao = seed_secao(&service).await;
    service.set_active(secao.id, false).await.unwrap();
    let result = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota"))
        .await;
    assert!(matches!(
        result,
        Err(AllocationError::ParentNotFound { kind: EntityKind::Secao, .. })
    ));

    // Una referencia con el tipo equivocado tampoco resuelve
    let wrong_kind = ParentRef::new(EntityKind::Rota, secao.id);
    let result = service
        .create_coded_entity(wrong_kind, EntityPayload::named("Ponto"))
        .await;
    assert!(matches!(result, Err(AllocationError::ParentNotFound { .. })));
}

#[tokio::test]
async fn test_localidade_parent_is_not_sequenced() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let localidade = service
        .register_localidade("07", EntityPayload::named("Sul"))
        .await
        .unwrap();

    let result = service
        .create_coded_entity(child_of(&localidade), EntityPayload::named("Secao"))
        .await;
    assert!(matches!(
        result,
        Err(AllocationError::NotSequenced(EntityKind::Secao))
    ));

    // La vista previa informa el mismo tipo hijo
    let preview = service.preview_next_code(child_of(&localidade)).await;
    assert!(matches!(
        preview,
        Err(AllocationError::NotSequenced(EntityKind::Secao))
    ));
}

#[tokio::test]
async fn test_duplicate_root_registration_is_case_insensitive() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    service
        .register_localidade("AB", EntityPayload::named("Primera"))
        .await
        .unwrap();

    let result = service
        .register_localidade("ab", EntityPayload::named("Segunda"))
        .await;
    assert!(matches!(result, Err(AllocationError::DuplicateCode { .. })));

    let result = service
        .register_localidade("A!", EntityPayload::named("Mala"))
        .await;
    assert!(matches!(result, Err(AllocationError::MalformedCode { .. })));
}

#[tokio::test]
async fn test_duplicate_secao_segment() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;
    let localidade_id = secao.parent_id.unwrap();

    let result = service
        .register_secao(localidade_id, "01", EntityPayload::named("Otra"))
        .await;
    assert!(matches!(result, Err(AllocationError::DuplicateCode { .. })));
}

#[tokio::test]
async fn test_conflicts_exhaust_retries() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 3);
    let secao = seed_secao(&service).await;

    store.inject_conflicts(3);
    let result = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota"))
        .await;
    assert!(matches!(
        result,
        Err(AllocationError::AllocationConflict { attempts: 3 })
    ));

    // Ningún número se consumió en los intentos abortados
    let rota = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota"))
        .await
        .unwrap();
    assert_eq!(rota.code, "030101");
}

#[tokio::test]
async fn test_conflicts_below_limit_are_retried() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 3);
    let secao = seed_secao(&service).await;

    store.inject_conflicts(2);
    let rota = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota"))
        .await
        .unwrap();
    assert_eq!(rota.code, "030101");
}

#[tokio::test]
async fn test_legacy_children_seed_the_counter() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;

    for sequence in [3u8, 7] {
        let legacy = NewCodedEntity {
            kind: EntityKind::Rota,
            code: format!("0301{:02}", sequence),
            parent_id: Some(secao.id),
            sequence: Some(sequence),
            payload: EntityPayload::named("Heredada"),
        }
        .into_entity(Utc::now());
        store.import_legacy(legacy).unwrap();
    }

    let preview = service.preview_next_code(child_of(&secao)).await.unwrap();
    assert_eq!(preview.code, "030108");

    let rota = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Nueva"))
        .await
        .unwrap();
    assert_eq!(rota.code, "030108");
}

#[tokio::test]
async fn test_preview_does_not_reserve() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;

    let first = service.preview_next_code(child_of(&secao)).await.unwrap();
    let second = service.preview_next_code(child_of(&secao)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.sequence, 1);
    assert_eq!(first.child_kind, EntityKind::Rota);

    let rota = service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota"))
        .await
        .unwrap();
    assert_eq!(rota.code, first.code);
}

#[tokio::test]
async fn test_validate_reports_malformed_codes() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);

    let outcome = service.validate("0301", EntityKind::Rota).await.unwrap();
    assert_eq!(outcome.reason, Some(InvalidReason::MalformedCode));

    let outcome = service.validate("030100", EntityKind::Rota).await.unwrap();
    assert_eq!(outcome.reason, Some(InvalidReason::MalformedCode));

    let outcome = service.validate("030101", EntityKind::Rota).await.unwrap();
    assert!(outcome.valid);
}

#[tokio::test]
async fn test_audit_flags_inconsistent_legacy_rows() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;
    service
        .create_coded_entity(child_of(&secao), EntityPayload::named("Rota"))
        .await
        .unwrap();

    let clean = service.audit(EntityKind::Rota).await.unwrap();
    assert!(clean.is_consistent());
    assert_eq!(clean.checked, 1);

    // Código de otra secao colgado de "0301" y con secuencia que no coincide
    let stray = NewCodedEntity {
        kind: EntityKind::Rota,
        code: "039905".to_string(),
        parent_id: Some(secao.id),
        sequence: Some(4),
        payload: EntityPayload::named("Extraviada"),
    }
    .into_entity(Utc::now());
    let stray_id = stray.id;
    store.import_legacy(stray).unwrap();

    let report = service.audit(EntityKind::Rota).await.unwrap();
    assert_eq!(report.checked, 2);
    assert!(!report.is_consistent());
    assert!(report.findings.iter().all(|f| f.entity_id == stray_id));
    assert_eq!(report.findings.len(), 2);
}

#[tokio::test]
async fn test_update_payload_keeps_code() {
    let store = MemoryCodeStore::new();
    let service = service_with(&store, 5);
    let secao = seed_secao(&service).await;

    let updated = service
        .update_payload(secao.id, EntityPayload::named("Secao Renombrada"))
        .await
        .unwrap();
    assert_eq!(updated.code, "0301");
    assert_eq!(updated.payload.name, "Secao Renombrada");

    let missing = service
        .update_payload(Uuid::new_v4(), EntityPayload::named("X"))
        .await;
    assert!(matches!(missing, Err(AllocationError::NotFound(_))));
}
