pub mod branch;
pub mod chat_channel;
pub mod chat_member;
pub mod chat_message;
pub mod inventory_item;
pub mod invoice;
pub mod menu_item;
pub mod order;
pub mod order_item;
pub mod recipe;
pub mod recipe_ingredient;
pub mod restaurant;
pub mod support_ticket;
pub mod ticket_message;
pub mod transaction;
pub mod user;
