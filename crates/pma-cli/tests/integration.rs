#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLANS: &str = "## Tasks\n\
| Task Name | Role | Start Date (YYYY-MM-DD) | End Date (YYYY-MM-DD) | Dependencies | Sprint | Subcontractor |\n\
|---|---|---|---|---|---|---|\n\
| Design | Architect | 2024-03-01 | 2024-03-05 | | Sprint 1 | No |\n\
| Build | Engineer | 2024-03-06 | 2024-03-20 | Design | Sprint 1 | No |\n\
\n## Milestones\n\
| Milestone Name | Date (YYYY-MM-DD) |\n\
|---|---|\n\
| MVP | 2024-03-20 |\n";

const RESOURCES: &str = "## Roles\n- Architect: designs the system\n- Engineer: builds it\n\n\
## Equipment\n- Laptops: development\n\n## Software & Services\n- None\n";

fn pma(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pma").unwrap();
    cmd.current_dir(dir.path())
        .env("PMA_ROOT", dir.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(dir: &TempDir) {
    pma(dir)
        .args(["init", "--name", "Apollo", "--description", "Customer portal"])
        .assert()
        .success();
}

fn json_out(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn doc_ids(dir: &TempDir) -> Vec<String> {
    let docs = json_out(pma(dir).args(["doc", "list"]));
    docs.as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

/// Fill every document by hand and approve it in order.
fn approve_all(dir: &TempDir) {
    for id in doc_ids(dir) {
        let content = match id.as_str() {
            "detailed-plans" => PLANS,
            "resources-skills-list" => RESOURCES,
            _ => "# Content\n\nWritten by hand.",
        };
        let file = dir.path().join(format!("{id}.md"));
        std::fs::write(&file, content).unwrap();
        pma(dir)
            .args(["doc", "edit", &id, "--file"])
            .arg(&file)
            .assert()
            .success();
        pma(dir).args(["doc", "approve", &id]).assert().success();
    }
}

// ---------------------------------------------------------------------------
// pma init / status
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_project() {
    let dir = TempDir::new().unwrap();
    pma(&dir)
        .args(["init", "--name", "Apollo", "--budget", "50000", "--end-date", "2024-12-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .pma/config.yaml"))
        .stdout(predicate::str::contains("9 documents"));

    assert!(dir.path().join(".pma/config.yaml").exists());
    assert!(dir.path().join(".pma/project.yaml").exists());
    assert!(dir.path().join(".pma/exports").is_dir());

    let project: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(dir.path().join(".pma/project.yaml")).unwrap())
            .unwrap();
    assert_eq!(project["name"].as_str(), Some("Apollo"));
    assert_eq!(project["budget"].as_i64(), Some(50000));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pma(&dir)
        .args(["init", "--name", "Other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .pma/project.yaml"));

    let status = json_out(pma(&dir).arg("status"));
    assert_eq!(status["project"], "Apollo");
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    pma(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pma init"));
}

#[test]
fn status_reports_locks_and_warnings() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let status = json_out(pma(&dir).arg("status"));

    let docs = status["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 9);
    assert_eq!(docs[0]["state"], "todo");
    assert_eq!(docs[1]["state"], "locked");
    assert_eq!(status["next_document"], "concept-proposal");
    assert_eq!(status["warnings"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// pma doc
// ---------------------------------------------------------------------------

#[test]
fn approving_a_locked_document_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pma(&dir)
        .args(["doc", "approve", "swot-analysis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked"));
}

#[test]
fn approving_without_content_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pma(&dir)
        .args(["doc", "approve", "concept-proposal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no content"));
}

#[test]
fn edit_show_and_export() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let file = dir.path().join("concept.md");
    std::fs::write(&file, "# Concept\n\nA portal.").unwrap();

    pma(&dir)
        .args(["doc", "edit", "concept-proposal", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("version 1"));
    pma(&dir)
        .args(["doc", "show", "concept-proposal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A portal."));
    pma(&dir)
        .args(["doc", "show", "concept-proposal", "--compacted"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no compacted content"));
    pma(&dir)
        .args(["doc", "export", "concept-proposal"])
        .assert()
        .success();

    let exported =
        std::fs::read_to_string(dir.path().join(".pma/exports/concept-proposal.md")).unwrap();
    assert_eq!(exported, "# Concept\n\nA portal.");
}

#[test]
fn generate_without_api_key_fails_clearly() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    pma(&dir)
        .args(["doc", "generate", "concept-proposal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

// ---------------------------------------------------------------------------
// Tracking, tasks, milestones
// ---------------------------------------------------------------------------

#[test]
fn approving_the_last_document_builds_tracking() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    approve_all(&dir);

    let tasks = json_out(pma(&dir).args(["task", "list"]));
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["name"], "Design");
    assert_eq!(tasks[1]["depends_on"][0], tasks[0]["id"]);

    pma(&dir)
        .arg("track")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tracking already exists"));
}

#[test]
fn task_flow_completes_milestones() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    approve_all(&dir);

    let tasks = json_out(pma(&dir).args(["task", "list"]));
    let design = tasks[0]["id"].as_str().unwrap().to_string();
    let build = tasks[1]["id"].as_str().unwrap().to_string();

    let next = json_out(pma(&dir).args(["task", "next"]));
    assert_eq!(next["id"], design.as_str());

    pma(&dir).args(["task", "start", &design]).assert().success();
    pma(&dir)
        .args(["task", "comment", &design, "schema", "drafted"])
        .assert()
        .success();
    pma(&dir)
        .args(["task", "actuals", &design, "--time", "6.5", "--cost", "400"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6.5 h"));
    pma(&dir).args(["task", "complete", &design]).assert().success();

    let next = json_out(pma(&dir).args(["task", "next"]));
    assert_eq!(next["id"], build.as_str());

    pma(&dir)
        .args(["task", "complete", &build])
        .assert()
        .success()
        .stdout(predicate::str::contains("milestones completed: 1"));

    let milestones = json_out(pma(&dir).args(["milestone", "list"]));
    assert_eq!(milestones[0]["status"], "completed");
}

#[test]
fn recurring_task_spawns_next_occurrence() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    approve_all(&dir);
    let tasks = json_out(pma(&dir).args(["task", "list"]));
    let design = tasks[0]["id"].as_str().unwrap().to_string();

    pma(&dir)
        .args(["task", "set", &design, "--recurrence", "weekly"])
        .assert()
        .success();
    pma(&dir)
        .args(["task", "complete", &design])
        .assert()
        .success()
        .stdout(predicate::str::contains("recurring: scheduled"));

    let tasks = json_out(pma(&dir).args(["task", "list", "--status", "todo"]));
    let spawned = tasks
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "Design")
        .unwrap();
    assert_eq!(spawned["start_date"], "2024-03-08");
}

#[test]
fn manual_milestone_completion() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    approve_all(&dir);
    let milestones = json_out(pma(&dir).args(["milestone", "list"]));
    let id = milestones[0]["id"].as_str().unwrap().to_string();

    pma(&dir)
        .args(["milestone", "complete", &id, "--date", "2024-03-22"])
        .assert()
        .success();
    pma(&dir)
        .args(["milestone", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+2d"));
}

// ---------------------------------------------------------------------------
// Impact, roles, change requests
// ---------------------------------------------------------------------------

#[test]
fn impact_projects_explicit_baseline_without_project() {
    let dir = TempDir::new().unwrap();
    let out = json_out(pma(&dir).args([
        "impact",
        "+15d +5000c",
        "--budget",
        "10000",
        "--end-date",
        "2024-06-01",
    ]));
    assert_eq!(out["projected"]["end_date"], "2024-06-16");
    assert_eq!(out["projected"]["budget"], 15000);
}

#[test]
fn negative_impact_uses_project_baseline() {
    let dir = TempDir::new().unwrap();
    pma(&dir)
        .args(["init", "--name", "Apollo", "--budget", "10000", "--end-date", "2024-06-01"])
        .assert()
        .success();
    pma(&dir)
        .args(["impact", "-5d -2000c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-06-01 -> 2024-05-27"))
        .stdout(predicate::str::contains("10000 -> 8000"));
}

#[test]
fn out_of_range_impact_is_an_error_not_a_crash() {
    let dir = TempDir::new().unwrap();
    pma(&dir)
        .args(["impact", "+100000000d", "--budget", "1", "--end-date", "2024-01-01"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("out of range"));

    init_project(&dir);
    pma(&dir)
        .args(["change", "create", "--title", "Huge", "--impact", "+9223372036854775807c"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("out of range"));
    let changes = json_out(pma(&dir).args(["change", "list"]));
    assert_eq!(changes, serde_json::json!([]));
}

#[test]
fn roles_come_from_the_resources_document() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    approve_all(&dir);
    let roles = json_out(pma(&dir).arg("roles"));
    assert_eq!(roles["roles"], serde_json::json!(["Architect", "Engineer"]));
    assert_eq!(roles["resources"], serde_json::json!(["Laptops"]));
}

#[test]
fn change_request_create_list_and_plan() {
    let dir = TempDir::new().unwrap();
    pma(&dir)
        .args(["init", "--name", "Apollo", "--budget", "10000", "--end-date", "2024-06-01"])
        .assert()
        .success();
    approve_all(&dir);

    pma(&dir)
        .args([
            "change", "create", "--title", "Add SSO", "--reason", "Customer ask", "--impact",
            "+10d +2000c",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cr-1]"));

    let changes = json_out(pma(&dir).args(["change", "list"]));
    assert_eq!(changes[0]["status"], "proposed");

    pma(&dir)
        .args(["change", "plan", "cr-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Deployment Plan: Add SSO"))
        .stdout(predicate::str::contains("2024-06-01 -> 2024-06-11"))
        .stdout(predicate::str::contains("## Task Modifications"))
        .stdout(predicate::str::contains("Design: end 2024-03-05 -> 2024-03-15"));
}

// ---------------------------------------------------------------------------
// pma config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_and_show() {
    let dir = TempDir::new().unwrap();
    pma(&dir)
        .args(["init", "--name", "Apollo", "--budget", "1", "--end-date", "2024-06-01"])
        .assert()
        .success();
    pma(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
    pma(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gemini-2.0-flash"));

    std::fs::write(
        dir.path().join(".pma/config.yaml"),
        "project: Apollo\nllm:\n  provider: bedrock\n",
    )
    .unwrap();
    pma(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] unknown llm provider 'bedrock'"));
}

// ---------------------------------------------------------------------------
// Generation against a mock Gemini endpoint
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn doc_generate_calls_gemini_and_compacts() {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "# Concept\n\nA portal."}]}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".pma/config.yaml"),
        format!(
            "project: Apollo\nllm:\n  base_url: {}\ngeneration:\n  max_retries: 0\n",
            server.uri()
        ),
    )
    .unwrap();

    let mut cmd = pma(&dir);
    cmd.env("GEMINI_API_KEY", "test-key")
        .args(["doc", "generate", "concept-proposal"]);
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("ready for review"));

    let project: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(dir.path().join(".pma/project.yaml")).unwrap())
            .unwrap();
    let data = &project["phase_data"]["concept-proposal"];
    assert_eq!(data["content"].as_str(), Some("# Concept\n\nA portal."));
    assert_eq!(data["compacted_content"].as_str(), Some("# Concept\n\nA portal."));
    assert_eq!(project["documents"][0]["status"].as_str(), Some("working"));
}
