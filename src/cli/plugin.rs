use bevy::prelude::*;

use super::{
    args::CliCommand,
    session::{
        exit_when_finished, issue_cli_command, report_cli_outcome, CliPrompt, CliSession,
        StdinPrompt,
    },
};

/// Runs a single command through the app and exits once it settles.
pub struct CliPlugin {
    command: CliCommand,
}

impl CliPlugin {
    pub fn new(command: CliCommand) -> Self {
        Self { command }
    }
}

impl Plugin for CliPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CliSession::new(self.command.clone()))
            .insert_resource(CliPrompt::new(StdinPrompt))
            .add_systems(
                Update,
                (issue_cli_command, report_cli_outcome, exit_when_finished).chain(),
            );
    }
}
