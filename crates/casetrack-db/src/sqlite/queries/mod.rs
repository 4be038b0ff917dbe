mod api_keys;
mod cases;
