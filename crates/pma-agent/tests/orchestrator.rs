mod common;

use chrono::Utc;
use common::*;
use pma_agent::agentic::{AgentOutcome, ChangeOutcome};
use pma_agent::{AgentError, Orchestrator};
use pma_core::change::ChangeRequest;
use pma_core::project::{Project, ProjectPatch, TrackingOutcome};
use pma_core::prompts::COMPACTION_INSTRUCTION;
use pma_core::types::{AgentStatus, ChangeStatus, DocumentStatus, GenerationStage};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn project() -> Project {
    Project::new("Apollo", "Customer portal rebuild", Utc::now())
}

#[tokio::test]
async fn generate_stores_content_and_compaction() {
    let dir = TempDir::new().unwrap();
    let gen = FakeGenerator::documents();
    let orch = Orchestrator::new(gen.clone(), &fast_config()).persist_to(dir.path());
    let mut p = project();

    orch.generate(&mut p, "concept-proposal").await.unwrap();

    let doc = p.document("concept-proposal").unwrap();
    assert_eq!(doc.status, DocumentStatus::Working);
    assert_eq!(doc.stage, None);
    assert_eq!(doc.version, 1);
    let data = p.data("concept-proposal").unwrap();
    assert!(data.content.starts_with("# Generated"));
    assert_eq!(data.compacted(), Some(COMPACTED));
    assert_eq!(gen.calls(), 2);

    let saved = Project::load(dir.path()).unwrap();
    assert_eq!(saved.data("concept-proposal").unwrap().compacted(), Some(COMPACTED));
}

#[tokio::test]
async fn resume_from_compacting_only_compacts() {
    let gen = FakeGenerator::documents();
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = project();
    p.apply(
        ProjectPatch::BeginGeneration {
            doc_id: "concept-proposal".into(),
        },
        Utc::now(),
    )
    .unwrap();
    p.apply(
        ProjectPatch::GenerationSucceeded {
            doc_id: "concept-proposal".into(),
            version: 1,
            content: "# Concept\nFull text".into(),
        },
        Utc::now(),
    )
    .unwrap();
    assert_eq!(
        p.document("concept-proposal").unwrap().stage,
        Some(GenerationStage::Compacting)
    );

    assert!(orch.resume(&mut p, "concept-proposal").await.unwrap());

    assert_eq!(gen.calls(), 1);
    assert!(gen.prompts()[0].starts_with(COMPACTION_INSTRUCTION));
    assert!(gen.prompts()[0].ends_with("# Concept\nFull text"));
    assert_eq!(p.data("concept-proposal").unwrap().content, "# Concept\nFull text");
    assert_eq!(p.document("concept-proposal").unwrap().stage, None);

    // Nothing left to do.
    assert!(!orch.resume(&mut p, "concept-proposal").await.unwrap());
    assert_eq!(gen.calls(), 1);
}

#[tokio::test]
async fn failed_generation_is_recorded() {
    let dir = TempDir::new().unwrap();
    let gen = FakeGenerator::new(|_| Err(invalid_key()));
    let orch = Orchestrator::new(gen.clone(), &fast_config()).persist_to(dir.path());
    let mut p = project();

    let err = orch.generate(&mut p, "concept-proposal").await.unwrap_err();
    assert!(matches!(err, AgentError::Llm(_)));

    let saved = Project::load(dir.path()).unwrap();
    let doc = saved.document("concept-proposal").unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert_eq!(doc.stage, None);
    assert!(doc.last_error.as_deref().unwrap().contains("API key"));
}

#[tokio::test]
async fn locked_document_is_refused_without_calling_the_provider() {
    let gen = FakeGenerator::documents();
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = project();

    let err = orch.generate(&mut p, "swot-analysis").await.unwrap_err();
    assert!(matches!(err, AgentError::Core(_)));
    assert_eq!(gen.calls(), 0);
}

#[tokio::test]
async fn context_carries_the_compacted_foundation() {
    let gen = FakeGenerator::documents();
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = project();

    orch.generate(&mut p, "concept-proposal").await.unwrap();
    orch.approve(&mut p, "concept-proposal").unwrap();
    let prompt = orch.document_prompt(&p, "resources-skills-list").unwrap();

    assert!(prompt.contains("CONTEXT FROM EARLIER APPROVED DOCUMENTS"));
    assert!(prompt.contains(COMPACTED));
    assert!(!prompt.contains("Body text."));
}

#[tokio::test]
async fn auto_approves_everything_and_builds_tracking() {
    let dir = TempDir::new().unwrap();
    let gen = FakeGenerator::documents();
    let orch = Orchestrator::new(gen.clone(), &fast_config()).persist_to(dir.path());
    let mut p = project();

    let summary = orch.auto(&mut p).await;

    assert!(summary.failure.is_none());
    assert_eq!(summary.approved.len(), 9);
    assert_eq!(
        summary.tracking,
        Some(TrackingOutcome::Built {
            tasks: 2,
            milestones: 1
        })
    );
    assert!(p.all_approved());
    assert_eq!(gen.calls(), 18);

    let saved = Project::load(dir.path()).unwrap();
    assert_eq!(saved.tasks.len(), 2);
    assert!(saved.tasks[1].is_subcontracted);
    assert_eq!(saved.tasks[1].depends_on, vec![saved.tasks[0].id.clone()]);
}

#[tokio::test]
async fn auto_halts_at_the_first_failure() {
    let gen = FakeGenerator::new(|prompt| {
        if writes(prompt, "SWOT Analysis") {
            Err(invalid_key())
        } else {
            Ok(document_reply(prompt))
        }
    });
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = project();

    let summary = orch.auto(&mut p).await;

    assert_eq!(summary.approved, vec!["concept-proposal", "resources-skills-list"]);
    let failure = summary.failure.unwrap();
    assert_eq!(failure.doc_id, "swot-analysis");
    assert!(failure.message.contains("API key"));
    assert_eq!(p.document("swot-analysis").unwrap().status, DocumentStatus::Failed);
    assert_eq!(p.document("kickoff-briefing").unwrap().status, DocumentStatus::Todo);
    assert!(!gen.prompts().iter().any(|q| writes(q, "Kickoff Briefing")));
}

#[tokio::test]
async fn auto_skips_approved_and_resumes_compaction() {
    let gen = FakeGenerator::documents();
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = project();
    orch.generate(&mut p, "concept-proposal").await.unwrap();
    orch.approve(&mut p, "concept-proposal").unwrap();
    p.apply(
        ProjectPatch::BeginGeneration {
            doc_id: "resources-skills-list".into(),
        },
        Utc::now(),
    )
    .unwrap();
    p.apply(
        ProjectPatch::GenerationSucceeded {
            doc_id: "resources-skills-list".into(),
            version: 1,
            content: "- Architect: design".into(),
        },
        Utc::now(),
    )
    .unwrap();
    let before = gen.calls();

    let summary = orch.auto(&mut p).await;

    assert_eq!(summary.approved.len(), 8);
    assert!(!gen.prompts()[before..]
        .iter()
        .any(|q| writes(q, "Concept Proposal") || writes(q, "Resources & Skills List")));
    assert_eq!(
        p.data("resources-skills-list").unwrap().content,
        "- Architect: design"
    );
}

#[tokio::test]
async fn propose_uses_a_valid_reply() {
    let gen = FakeGenerator::new(|_| {
        let items: Vec<String> = (1..=9)
            .map(|p| format!(r#"{{"title": "Step {p}", "phase": {p}}}"#))
            .collect();
        Ok(format!("```json\n[{}]\n```", items.join(",")))
    });
    let orch = Orchestrator::new(gen, &fast_config());

    let (docs, proposed) = orch.propose("Apollo", "Portal").await;
    assert!(proposed);
    assert_eq!(docs.len(), 9);
    assert_eq!(docs[0].title, "Step 1");
}

#[tokio::test]
async fn propose_falls_back_to_hmap() {
    let gen = FakeGenerator::new(|_| Ok("I cannot help with that".into()));
    let orch = Orchestrator::new(gen, &fast_config());

    let (docs, proposed) = orch.propose("Apollo", "Portal").await;
    assert!(!proposed);
    assert_eq!(docs.len(), 9);
    assert_eq!(docs[6].title, "Detailed Plans");
}

async fn tracked_project(orch: &Orchestrator) -> Project {
    let mut p = project();
    let summary = orch.auto(&mut p).await;
    assert!(summary.failure.is_none());
    p
}

#[tokio::test]
async fn task_agent_adds_an_approved_deliverable() {
    let gen = FakeGenerator::new(|prompt| {
        Ok(if prompt.starts_with("You are the Doer") {
            "# Design notes\nArchitecture decided.".into()
        } else if prompt.starts_with("You are the Tools reviewer") {
            "SUFFICIENT".into()
        } else if prompt.starts_with("You are the Tester") {
            "COMPLETE".into()
        } else {
            document_reply(prompt)
        })
    });
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = tracked_project(&orch).await;
    let task_id = p.tasks[0].id.clone();

    let outcome = orch.run_task_agent(&mut p, &task_id).await.unwrap();

    match outcome {
        AgentOutcome::Completed {
            title, iterations, ..
        } => {
            assert_eq!(title, "Design Deliverable");
            assert_eq!(iterations, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(p.documents.len(), 10);
    let doc = p.ordered_documents().last().copied().unwrap().clone();
    assert_eq!(doc.title, "Design Deliverable");
    assert_eq!(doc.status, DocumentStatus::Approved);
    assert_eq!(p.tasks[0].agent_status, Some(AgentStatus::Completed));
    let doer = gen
        .prompts()
        .into_iter()
        .find(|q| q.starts_with("You are the Doer"))
        .unwrap();
    assert!(doer.contains(COMPACTED));
}

#[tokio::test]
async fn task_agent_gives_up_at_the_cap() {
    let gen = FakeGenerator::new(|prompt| {
        Ok(if prompt.starts_with("You are the Tester") {
            "The schedule section is missing.".into()
        } else if prompt.starts_with("You are the") {
            "draft".into()
        } else {
            document_reply(prompt)
        })
    });
    let mut cfg = fast_config();
    cfg.agents.task_max_iterations = 2;
    let orch = Orchestrator::new(gen.clone(), &cfg);
    let mut p = tracked_project(&orch).await;
    let task_id = p.tasks[0].id.clone();

    let outcome = orch.run_task_agent(&mut p, &task_id).await.unwrap();

    assert!(matches!(
        outcome,
        AgentOutcome::NeedsManualCompletion { iterations: 2, .. }
    ));
    assert_eq!(gen.calls_starting_with("You are the Tester"), 2);
    assert_eq!(p.tasks[0].agent_status, Some(AgentStatus::Failed));
    assert_eq!(p.documents.len(), 9);
}

fn with_change(p: &mut Project) {
    p.apply(
        ProjectPatch::AddChangeRequest(ChangeRequest::new(
            "cr-1",
            "Extend launch",
            "Vendor delay",
            "+10d +5000c",
            Utc::now(),
        )),
        Utc::now(),
    )
    .unwrap();
}

#[tokio::test]
async fn change_agent_revises_after_qa_feedback() {
    let qa_calls = AtomicUsize::new(0);
    let gen = FakeGenerator::new(move |prompt| {
        Ok(if prompt.starts_with("You identify which project documents") {
            r#"{"affected": ["statement of work", "Unknown Doc"]}"#.into()
        } else if prompt.starts_with("You revise a project document") {
            "# Statement of Work\nSchedule extended by 10 days.".into()
        } else if prompt.starts_with("You are QA") {
            if qa_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                "Budget figures are not updated".into()
            } else {
                "APPROVED".into()
            }
        } else {
            document_reply(prompt)
        })
    });
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = tracked_project(&orch).await;
    with_change(&mut p);
    let version = p.document("statement-of-work").unwrap().version;

    let outcome = orch.run_change(&mut p, "cr-1").await.unwrap();

    match outcome {
        ChangeOutcome::Applied {
            revisions,
            iterations,
            ..
        } => {
            assert_eq!(iterations, 2);
            assert_eq!(revisions.len(), 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let retry = gen
        .prompts()
        .into_iter()
        .filter(|q| q.starts_with("You identify which project documents"))
        .nth(1)
        .unwrap();
    assert!(retry.contains("Budget figures are not updated"));

    let doc = p.document("statement-of-work").unwrap();
    assert_eq!(doc.status, DocumentStatus::Working);
    assert_eq!(doc.version, version + 1);
    assert!(p
        .data("statement-of-work")
        .unwrap()
        .content
        .contains("extended by 10 days"));
    let change = p.change("cr-1").unwrap();
    assert_eq!(change.status, ChangeStatus::Applied);
    assert_eq!(change.affected, vec!["statement-of-work"]);
    // Untouched documents stay approved.
    assert_eq!(p.document("swot-analysis").unwrap().status, DocumentStatus::Approved);
}

#[tokio::test]
async fn change_agent_keeps_the_tail_of_long_documents() {
    let gen = FakeGenerator::new(|prompt| {
        Ok(if prompt.starts_with("You identify which project documents") {
            r#"{"affected": ["Statement of Work"]}"#.into()
        } else if prompt.starts_with("You revise a project document") {
            "# Statement of Work\nSchedule extended by 10 days.\n".into()
        } else if prompt.starts_with("You are QA") {
            "APPROVED".into()
        } else {
            document_reply(prompt)
        })
    });
    let orch = Orchestrator::new(gen.clone(), &fast_config());
    let mut p = tracked_project(&orch).await;
    with_change(&mut p);
    let appendix = format!("## Appendix\n{}", "Signed vendor terms.\n".repeat(20));
    p.apply(
        ProjectPatch::EditContent {
            doc_id: "statement-of-work".into(),
            content: format!("# Statement of Work\nSchedule as planned.\n{appendix}"),
        },
        Utc::now(),
    )
    .unwrap();

    // 45 chars per document: the heading and schedule lines only.
    let mut cfg = fast_config();
    cfg.generation.max_payload_chars = 90;
    let capped = Orchestrator::new(gen.clone(), &cfg);
    let outcome = capped.run_change(&mut p, "cr-1").await.unwrap();

    assert!(matches!(outcome, ChangeOutcome::Applied { .. }));
    assert_eq!(
        p.data("statement-of-work").unwrap().content,
        format!("# Statement of Work\nSchedule extended by 10 days.\n{appendix}")
    );
    let revise = gen
        .prompts()
        .into_iter()
        .find(|q| q.starts_with("You revise a project document"))
        .unwrap();
    assert!(revise.contains("Schedule as planned."));
    assert!(!revise.contains("Signed vendor terms."));
}

#[tokio::test]
async fn change_agent_failure_marks_the_change() {
    let gen = FakeGenerator::new(|prompt| {
        if prompt.starts_with("You identify which project documents") {
            Err(invalid_key())
        } else {
            Ok(document_reply(prompt))
        }
    });
    let orch = Orchestrator::new(gen, &fast_config());
    let mut p = tracked_project(&orch).await;
    with_change(&mut p);

    let outcome = orch.run_change(&mut p, "cr-1").await.unwrap();

    assert!(matches!(outcome, ChangeOutcome::NeedsManualCompletion { iterations: 1, .. }));
    assert_eq!(p.change("cr-1").unwrap().status, ChangeStatus::Failed);
    assert!(p.all_approved());
}
