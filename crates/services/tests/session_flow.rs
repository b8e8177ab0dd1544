use course_core::model::{
    CardId, Curriculum, EngineSettings, EngineSettingsDraft, ModuleId, UserId,
};
use course_core::optimistic::WriteOutcome;
use course_core::time::fixed_now;
use services::{AccessDenied, AppServices, Clock, SectionView};

const CURRICULUM: &str = r#"{"modules": [
    {"id": "start", "title": "Start here", "cards": [
        {"id": "inst-1", "title": "How this course works", "type": "text"}
    ]},
    {"id": "choose", "title": "Choose a programme", "cards": [
        {"id": "ppg-1", "title": "Map programmes", "type": "checklist",
         "content": "Intro\n- [ ] List five programmes\n- [ ] Read their rules\nMiddle\n- [x] Pick one"},
        {"id": "ppg-2", "title": "Talk to a supervisor", "type": "text"},
        {"id": "ppg-b", "title": "Bônus: alumni stories", "type": "video"}
    ]},
    {"id": "build", "title": "Build the application", "cards": [
        {"id": "cv-1", "title": "Write the CV", "type": "form"}
    ]}
]}"#;

fn user() -> UserId {
    UserId::new(uuid::Uuid::from_u128(0xBEEF))
}

async fn services(db: &str) -> AppServices {
    let curriculum = Curriculum::from_json(CURRICULUM).expect("curriculum");
    AppServices::new_sqlite(
        &format!("sqlite:file:{db}?mode=memory&cache=shared"),
        Clock::fixed(fixed_now()),
        curriculum,
        EngineSettings::default(),
    )
    .await
    .expect("connect sqlite")
}

#[tokio::test]
async fn onboarding_gates_every_other_card() {
    let services = services("memdb_session_gate").await;
    let mut session = services.sign_in(user()).await;
    let ppg = CardId::new("ppg-1");
    let onboarding = CardId::new("inst-1");

    let refused = session.open_card(&ppg).await.unwrap_err();
    assert_eq!(
        refused,
        AccessDenied::OnboardingIncomplete {
            onboarding: onboarding.clone()
        }
    );
    assert!(session.open_card(&onboarding).await.is_ok());

    session.toggle_card(&onboarding).await.expect("toggle onboarding");
    let view = session.open_card(&ppg).await.expect("open after onboarding");
    assert_eq!(view.title, "Map programmes");
    assert!(matches!(
        session.open_card(&CardId::new("nope")).await,
        Err(AccessDenied::UnknownCard(_))
    ));
}

#[tokio::test]
async fn modules_unlock_when_required_cards_complete() {
    let services = services("memdb_session_unlock").await;
    let mut session = services.sign_in(user()).await;

    assert_eq!(
        session.board().iter().map(|m| m.locked).collect::<Vec<_>>(),
        vec![false, true, true]
    );

    session.toggle_card(&CardId::new("inst-1")).await.unwrap();
    assert!(!session.is_module_locked(1));
    assert!(session.is_module_locked(2));

    session.toggle_card(&CardId::new("ppg-1")).await.unwrap();
    session.toggle_card(&CardId::new("ppg-2")).await.unwrap();

    let board = session.board();
    assert!(!board[2].locked);
    assert_eq!(board[1].percentage, 67);
}

#[tokio::test]
async fn locked_module_refuses_open_and_writes() {
    let services = services("memdb_session_locked").await;
    let mut session = services.sign_in(user()).await;
    let cv = CardId::new("cv-1");
    session.toggle_card(&CardId::new("inst-1")).await.unwrap();
    assert!(session.is_module_locked(2));

    let locked = AccessDenied::ModuleLocked {
        module: ModuleId::new("build"),
    };
    assert_eq!(session.open_card(&cv).await.unwrap_err(), locked);
    assert_eq!(session.toggle_card(&cv).await, Err(locked.clone()));
    assert_eq!(session.checklist_view(&cv), Err(locked));
    assert!(!session.progress().progress().get(&cv));
    assert!(session.notes().current().is_none());

    session.toggle_card(&CardId::new("ppg-1")).await.unwrap();
    session.toggle_card(&CardId::new("ppg-2")).await.unwrap();
    assert_eq!(
        session.toggle_card(&cv).await,
        Ok(WriteOutcome::Persisted { completed: true })
    );
}

#[tokio::test]
async fn writes_are_refused_before_onboarding() {
    let services = services("memdb_session_early_writes").await;
    let mut session = services.sign_in(user()).await;
    let refused = AccessDenied::OnboardingIncomplete {
        onboarding: CardId::new("inst-1"),
    };

    assert_eq!(
        session.toggle_card(&CardId::new("cv-1")).await,
        Err(refused.clone())
    );
    assert_eq!(
        session.toggle_item(&CardId::new("ppg-1"), 0).await,
        Err(refused)
    );
    assert_eq!(session.progress().progress().completed_count(), 0);
    assert_eq!(session.checklist().card_progress(&CardId::new("ppg-1"), 3).completed, 0);

    let reloaded = services.sign_in(user()).await;
    assert_eq!(reloaded.overall_percentage(), 0);
}

#[tokio::test]
async fn overall_percentage_counts_every_card() {
    let services = services("memdb_session_overall").await;
    let mut session = services.sign_in(user()).await;
    assert_eq!(session.overall_percentage(), 0);

    session.toggle_card(&CardId::new("inst-1")).await.unwrap();
    assert_eq!(session.overall_percentage(), 20);

    session.toggle_card(&CardId::new("ppg-1")).await.unwrap();
    session.toggle_card(&CardId::new("ppg-b")).await.unwrap();
    assert_eq!(session.overall_percentage(), 60);
}

#[tokio::test]
async fn progress_survives_a_new_session() {
    let services = services("memdb_session_reload").await;
    let mut session = services.sign_in(user()).await;
    let card = CardId::new("ppg-1");
    session.toggle_card(&CardId::new("inst-1")).await.unwrap();
    session.open_card(&card).await.expect("open");
    session.toggle_item(&card, 2).await.unwrap();
    session.notes_mut().edit("apply in march");
    session.sign_out().await;

    let mut session = services.sign_in(user()).await;
    assert!(!session.is_module_locked(1));
    let view = session.open_card(&card).await.expect("open");

    let SectionView::Checklist { items, stats } = &view.sections[3] else {
        panic!("expected the second checklist section");
    };
    assert_eq!(items[0].index, 2);
    assert!(items[0].completed);
    assert_eq!((stats.completed, stats.total), (1, 1));
    assert_eq!(view.checklist.completed, 1);
    assert_eq!(view.checklist.total, 3);
    assert_eq!(
        session.notes().current().map(|note| note.content().to_owned()),
        Some("apply in march".to_owned())
    );
}

#[tokio::test]
async fn anonymous_session_is_read_only() {
    let services = services("memdb_session_anonymous").await;
    let mut session = services.session_for(None).await;
    let onboarding = CardId::new("inst-1");

    assert!(session.is_anonymous());
    assert_eq!(session.toggle_card(&onboarding).await, Ok(WriteOutcome::Ignored));
    assert!(session.toggle_item(&CardId::new("ppg-1"), 0).await.is_err());
    assert!(session.is_module_locked(1));
    assert!(session.save_diagnostic(&session.load_diagnostic().await).await.is_err());
}

#[tokio::test]
async fn unknown_onboarding_override_is_rejected() {
    let curriculum = Curriculum::from_json(CURRICULUM).expect("curriculum");
    let settings = EngineSettingsDraft {
        note_debounce_ms: Some(500),
        onboarding_card: Some("missing".into()),
    }
    .validate()
    .expect("settings");

    let result = AppServices::in_memory(Clock::fixed(fixed_now()), curriculum, settings);

    assert!(result.is_err());
}
