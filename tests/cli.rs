use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_script(body: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp script");
    tmp.write_all(body.as_bytes()).expect("write script");
    tmp
}

#[test]
fn bundled_demo_completes_the_storyline() {
    let mut cmd = Command::cargo_bin("lifebot-town").expect("binary exists");
    cmd.assert()
        .success()
        .stdout(contains("Loaded Lifebot Town with 4 quests, 3 jobs"))
        .stdout(contains("  > FlameBot transfers a welcome bonus of 10 coins."))
        .stdout(contains("  > Harbor bridge unfurls across the bay."))
        .stdout(contains("  > Spy initiative complete!"))
        .stdout(contains("  > You discovered FlameBot's emergency fund."))
        .stdout(contains("  > These glow berries need more time to regrow."))
        .stdout(contains(" coins: 97"))
        .stdout(contains(
            "  - spy-initiative (Spy Initiative) 3/3 objectives [complete]",
        ))
        .stdout(contains(
            "  - harbor-briefing (Harbor Systems Check) 3/3 objectives [complete]",
        ))
        .stdout(contains(" active quest: none"));
}

#[test]
fn scripted_onboarding_pays_the_welcome_bonus() {
    let script = write_script(
        "# onboarding only\nlook fountain\nlook flamebot\npress E\nlook-away\n",
    );
    let mut cmd = Command::cargo_bin("lifebot-town").expect("binary exists");
    cmd.arg("--script").arg(script.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains(" coins: 35"))
        .stdout(contains(
            "  - first-steps (First Steps in Lifebot Town) 3/3 objectives [complete]",
        ))
        .stdout(contains(" active quest: suit-up"))
        .stdout(contains("  > ").not());
}

#[test]
fn refused_purchase_keeps_coins() {
    let script = write_script("look shop-item-spy-pass\npress E\npress E\n");
    let mut cmd = Command::cargo_bin("lifebot-town").expect("binary exists");
    cmd.arg("--script").arg(script.path());
    cmd.assert()
        .success()
        .stdout(contains("  > -14 coins (purchase)"))
        .stdout(contains("  > You need 14 coins for this (purchase)."))
        .stdout(contains(" coins: 11"));
}

#[test]
fn unknown_command_reports_its_line() {
    let script = write_script("look fountain\n\nmoonwalk\n");
    let mut cmd = Command::cargo_bin("lifebot-town").expect("binary exists");
    cmd.arg("--script").arg(script.path());
    cmd.assert()
        .failure()
        .stderr(contains("line 3"))
        .stderr(contains("unknown command moonwalk"));
}

#[test]
fn custom_content_pack_is_validated() {
    let mut pack = NamedTempFile::new().expect("temp pack");
    pack.write_all(
        br#"<town>
  <job id="idle" reward="0">Stand around</job>
</town>
"#,
    )
    .expect("write pack");
    let script = write_script("tick\n");
    let mut cmd = Command::cargo_bin("lifebot-town").expect("binary exists");
    cmd.arg("--content")
        .arg(pack.path())
        .arg("--script")
        .arg(script.path());
    cmd.assert().failure().stderr(contains("idle"));
}
