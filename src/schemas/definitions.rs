use crate::models::activity::ACTIVITY_TYPES;
use crate::models::tag::TAG_TYPES;
use crate::schemas::{Field, Schema};

pub static USER_SCHEMA: Schema = Schema {
    name: "user",
    fields: &[
        Field::string("email").max_length(255).email(),
        Field::string("first_name").max_length(60),
        Field::string("last_name").max_length(80),
        Field::string("password").missing_ok().length(6, 128),
        Field::boolean("is_admin").missing_ok().write_permission("time_user_set_is_admin"),
    ],
};

pub static USER_SIGNUP_SCHEMA: Schema = Schema {
    name: "signup",
    fields: &[
        Field::string("email").max_length(255).email(),
        Field::string("first_name").max_length(60),
        Field::string("last_name").max_length(80),
        Field::string("password").length(6, 128),
    ],
};

pub static USER_SIGNIN_SCHEMA: Schema = Schema {
    name: "signin",
    fields: &[Field::string("email").email(), Field::string("password")],
};

pub static GROUP_SCHEMA: Schema = Schema {
    name: "group",
    fields: &[
        Field::string("name").length(1, 50),
        Field::string("description").optional().max_length(255),
    ],
};

pub static CLIENT_SCHEMA: Schema = Schema {
    name: "client",
    fields: &[Field::string("name").length(1, 50)],
};

pub static PROJECT_SCHEMA: Schema = Schema {
    name: "project",
    fields: &[
        Field::string("name").length(3, 255),
        Field::integer("client_id").optional(),
        Field::integer("parent_id").optional(),
        Field::integer("user_id").optional(),
        Field::boolean("is_public").missing_ok().write_permission("time_project_set_is_public"),
        Field::boolean("is_active").missing_ok(),
        Field::datetime("active_from").optional(),
        Field::datetime("active_until").optional(),
    ],
};

pub static TASK_SCHEMA: Schema = Schema {
    name: "task",
    fields: &[
        Field::string("name").length(1, 255),
        Field::integer("parent_id").optional(),
        Field::integer("project_id").optional(),
        Field::integer("user_id").optional(),
    ],
};

pub static TAG_SCHEMA: Schema = Schema {
    name: "tag",
    fields: &[
        Field::string("name").length(1, 255),
        Field::string("short_name").optional().max_length(16),
        Field::string("description").optional(),
        Field::string("tag_type").missing_ok().one_of(&TAG_TYPES),
        Field::integer("original_id").optional(),
        Field::integer("user_id").optional(),
    ],
};

pub static ACTIVITY_SCHEMA: Schema = Schema {
    name: "activity",
    fields: &[
        Field::string("description").length(1, 255),
        Field::datetime("start").missing_ok(),
        Field::datetime("end").optional(),
        Field::string("activity_type").missing_ok().one_of(&ACTIVITY_TYPES),
        Field::integer("project_id").optional(),
        Field::integer("task_id").optional(),
        Field::integer("user_id").optional(),
    ],
};
