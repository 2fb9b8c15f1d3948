use toiawase_browser::{BrowserEngine, LaunchOptions, ScopeRef};
use toiawase_core::config::RunConfig;
use toiawase_core::{KeywordTable, Profile, ReasonCode, Target};
use toiawase_engine::fill::{apply_fill, plan_fill};
use toiawase_engine::resolver;
use toiawase_engine::submit::{choose_submit, Stage};
use toiawase_engine::{NullOcr, Runner, RunnerConfig};

const INQUIRY_FORM: &str = r#"document.body.innerHTML = `
  <form>
    <p><label for='corp'>会社名</label><input id='corp' name='corp'></p>
    <p><label for='nm'>お名前</label><input id='nm' name='nm'></p>
    <p><label for='ml'>メールアドレス</label><input id='ml' type='email' name='ml'></p>
    <p><label for='msg'>お問い合わせ内容</label><textarea id='msg' name='msg' rows='5'></textarea></p>
    <p><button type='submit'>送信する</button></p>
  </form>`"#;

fn test_profile() -> Profile {
    Profile {
        name: "山田 太郎".to_string(),
        company: "株式会社テスト".to_string(),
        email: "taro@example.co.jp".to_string(),
        message: "お世話になります。製品カタログを希望します。".to_string(),
        ..Profile::default()
    }
}

#[tokio::test]
#[ignore = "Requires Chrome browser to be installed"]
async fn test_resolve_fill_and_choose_on_live_dom() {
    let mut engine = BrowserEngine::launch(LaunchOptions::default())
        .await
        .expect("Failed to launch browser");
    let session = engine.new_session().await.expect("Failed to open session");
    session.run(INQUIRY_FORM).await.expect("Failed to seed DOM");

    let scope = resolver::resolve(&session)
        .await
        .expect("Resolver failed")
        .expect("Form not found in any scope");
    assert_eq!(scope, ScopeRef::Main);

    let table = KeywordTable::builtin();
    let profile = test_profile();
    let dom = session.scope(scope);

    let controls = dom.collect_controls().await.expect("Failed to collect");
    let plan = plan_fill(&controls, &profile, table, "-");
    assert!(
        plan.response_control.is_some(),
        "Inquiry textarea should be recognized as the response control"
    );
    let report = apply_fill(&dom, &plan).await.expect("Failed to apply fill");
    assert!(report.applied >= 4, "Expected name, company, email and message writes");
    assert_eq!(report.failed, 0);

    let controls = dom.collect_controls().await.expect("Failed to re-collect");
    let name = controls
        .iter()
        .find(|c| c.name == "nm")
        .expect("Name control missing after fill");
    assert_eq!(name.value, "山田 太郎");
    let message = controls
        .iter()
        .find(|c| c.name == "msg")
        .expect("Message control missing after fill");
    assert!(message.value.contains("製品カタログ"));

    let scan = dom.collect_clickables().await.expect("Failed to scan clickables");
    let choice = choose_submit(&scan, table, Stage::Initial).expect("No submit control chosen");
    assert!(choice.description.contains("送信"));

    engine.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "Requires Chrome browser to be installed"]
async fn test_batch_records_one_outcome_per_target() {
    let mut engine = BrowserEngine::launch(LaunchOptions::default())
        .await
        .expect("Failed to launch browser");

    // First target cannot resolve; second loads but carries no form.
    let targets = vec![
        Target::new("接続不能株式会社", "https://unroutable.invalid/"),
        Target::new(
            "白紙株式会社",
            "data:text/html;charset=utf-8,<p>会社案内</p>",
        ),
    ];
    let runner = Runner::new(
        KeywordTable::builtin().clone(),
        RunnerConfig::from(&RunConfig::default()),
        Box::new(NullOcr),
    );
    let summary = runner
        .run_batch(&engine, &targets, &test_profile())
        .await
        .expect("Failed to run the batch");

    assert_eq!(summary.outcomes.len(), targets.len());
    assert_eq!(summary.outcomes[0].company, "接続不能株式会社");
    assert_eq!(summary.outcomes[0].reason, ReasonCode::ErrException);
    assert_eq!(summary.outcomes[1].company, "白紙株式会社");
    assert_eq!(summary.outcomes[1].reason, ReasonCode::ErrNoForm);
    assert!(summary.outcomes.iter().all(|o| !o.success));
    assert_eq!(summary.failed(), 2);

    engine.close().await.expect("Failed to close browser");
}
