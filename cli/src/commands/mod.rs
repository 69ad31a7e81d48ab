mod goal;
mod helpers;
mod meal;
mod push;
mod remind;
mod reminders;
mod summary;
mod weight;

pub(crate) use goal::{GoalUpdate, cmd_goal_set, cmd_goal_show};
pub(crate) use meal::{
    NewFood, cmd_meal_add, cmd_meal_add_food, cmd_meal_list, cmd_meal_remove,
    cmd_meal_remove_food, cmd_meal_toggle,
};
pub(crate) use push::{cmd_push_register, cmd_push_status};
pub(crate) use remind::cmd_remind_dispatch;
pub(crate) use reminders::{cmd_reminders_clear, cmd_reminders_list, cmd_reminders_sync};
pub(crate) use summary::cmd_summary;
pub(crate) use weight::{cmd_weight_delete, cmd_weight_history, cmd_weight_log};
