mod keycards;
mod login;
mod register;
