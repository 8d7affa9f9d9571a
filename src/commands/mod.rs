pub mod close;
pub mod lock;
pub mod posts;

use serenity::builder::CreateApplicationCommands;

pub fn register_all(commands: &mut CreateApplicationCommands) -> &mut CreateApplicationCommands {
    commands
        .create_application_command(|command| posts::register(command))
        .create_application_command(|command| posts::register_menu(command))
        .create_application_command(|command| close::register(command))
        .create_application_command(|command| lock::register(command))
}
